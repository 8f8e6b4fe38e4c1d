//! Legacy HTTP+SSE transport.
//!
//! `GET /mcp` opens an event stream and announces a per-session POST
//! endpoint; `POST /mcp?sessionId=<id>` feeds client messages into that
//! session. Each stream gets its own server instance built from the query
//! string of the `GET` that opened it.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use rmcp::ServiceExt;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use serde::Deserialize;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::{CancellationToken, PollSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::transport::SessionFactory;
use crate::config::QueryParams;

const CHANNEL_CAPACITY: usize = 64;

/// Inbound channels keyed by session id.
type SessionTable = Arc<RwLock<HashMap<String, mpsc::Sender<ClientJsonRpcMessage>>>>;

#[derive(Clone)]
struct SseState {
    sessions: SessionTable,
    factory: SessionFactory,
    ct: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Builds the `/mcp` routes for the SSE transport.
///
/// Cancelling `ct` ends every open session.
pub fn router(factory: SessionFactory, ct: CancellationToken) -> Router {
    let state = SseState {
        sessions: SessionTable::default(),
        factory,
        ct,
    };
    routes(state)
}

fn routes(state: SseState) -> Router {
    Router::new()
        .route("/mcp", get(open_stream).post(post_message))
        .with_state(state)
}

async fn open_stream(
    State(state): State<SseState>,
    uri: Uri,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let query = QueryParams::from_uri(&uri);
    let server = state.factory.build_for(Some(&query));

    let session_id = Uuid::new_v4().to_string();
    let (client_tx, client_rx) = mpsc::channel::<ClientJsonRpcMessage>(CHANNEL_CAPACITY);
    let (server_tx, server_rx) = mpsc::channel::<ServerJsonRpcMessage>(CHANNEL_CAPACITY);
    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), client_tx);
    info!(session_id = %session_id, "SSE session opened");

    let session_ct = state.ct.child_token();
    let task_ct = session_ct.clone();
    let sessions = Arc::clone(&state.sessions);
    let id = session_id.clone();
    tokio::spawn(async move {
        let transport = (PollSender::new(server_tx), ReceiverStream::new(client_rx));
        // Initialization waits on the client, so it must also observe cancellation.
        let started = tokio::select! {
            () = task_ct.cancelled() => None,
            result = server.serve_with_ct(transport, task_ct.clone()) => Some(result),
        };
        match started {
            Some(Ok(service)) => {
                if let Err(e) = service.waiting().await {
                    warn!(session_id = %id, error = %e, "SSE session terminated abnormally");
                }
            }
            Some(Err(e)) => {
                warn!(session_id = %id, error = %e, "SSE session failed to initialize");
            }
            None => debug!(session_id = %id, "SSE session cancelled before initialization"),
        }
        sessions.write().await.remove(&id);
        info!(session_id = %id, "SSE session closed");
    });

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/mcp?sessionId={session_id}"));

    // Dropping the stream (client disconnect) cancels the session.
    let guard = session_ct.drop_guard();
    let messages = ReceiverStream::new(server_rx).filter_map(move |message| {
        let _session = &guard;
        match serde_json::to_string(&message) {
            Ok(data) => Some(Ok(Event::default().event("message").data(data))),
            Err(e) => {
                warn!(error = %e, "Dropping unserializable server message");
                None
            }
        }
    });

    Sse::new(tokio_stream::once(Ok(endpoint)).chain(messages)).keep_alive(KeepAlive::default())
}

async fn post_message(
    State(state): State<SseState>,
    Query(query): Query<SessionQuery>,
    Json(message): Json<ClientJsonRpcMessage>,
) -> StatusCode {
    let sender = state.sessions.read().await.get(&query.session_id).cloned();
    let Some(sender) = sender else {
        debug!(session_id = %query.session_id, "Message for unknown SSE session");
        return StatusCode::NOT_FOUND;
    };

    if sender.send(message).await.is_err() {
        state.sessions.write().await.remove(&query.session_id);
        return StatusCode::GONE;
    }
    StatusCode::ACCEPTED
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt as _;

    use super::*;
    use crate::config::ConfigResolver;
    use crate::mcp::server::ServerFactory;
    use crate::mcp::server::tests::FakeArchive;

    const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"0.0.0"}}}"#;

    const INITIALIZED: &str = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;

    fn state() -> SseState {
        let resolver = ConfigResolver::new(Arc::new(HashMap::<String, String>::new()));
        SseState {
            sessions: SessionTable::default(),
            factory: SessionFactory::new(
                resolver,
                ServerFactory::new(Arc::new(FakeArchive::default())),
            ),
            ct: CancellationToken::new(),
        }
    }

    fn post(session_id: &str, body: &str) -> Request<Body> {
        Request::post(format!("/mcp?sessionId={session_id}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|e| panic!("request: {e}"))
    }

    async fn next_chunk(body: &mut Body) -> String {
        let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for event"))
            .unwrap_or_else(|| panic!("stream ended"))
            .unwrap_or_else(|e| panic!("frame: {e}"));
        let data = frame
            .into_data()
            .unwrap_or_else(|_| panic!("expected a data frame"));
        String::from_utf8_lossy(&data).into_owned()
    }

    #[tokio::test]
    async fn test_post_to_unknown_session_is_not_found() {
        let response = routes(state())
            .oneshot(post("missing", INITIALIZE))
            .await
            .unwrap_or_else(|e| panic!("oneshot: {e}"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let state = state();
        let sessions = Arc::clone(&state.sessions);
        let app = routes(state);

        let response = app
            .clone()
            .oneshot(
                Request::get("/mcp?downloadPath=/books")
                    .body(Body::empty())
                    .unwrap_or_else(|e| panic!("request: {e}")),
            )
            .await
            .unwrap_or_else(|e| panic!("oneshot: {e}"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut body = response.into_body();
        let endpoint = next_chunk(&mut body).await;
        assert!(endpoint.contains("event: endpoint"));
        let session_id = endpoint
            .split("sessionId=")
            .nth(1)
            .map(str::trim)
            .unwrap_or_else(|| panic!("no session id in {endpoint}"))
            .to_string();
        assert_eq!(sessions.read().await.len(), 1);

        let accepted = app
            .clone()
            .oneshot(post(&session_id, INITIALIZE))
            .await
            .unwrap_or_else(|e| panic!("oneshot: {e}"));
        assert_eq!(accepted.status(), StatusCode::ACCEPTED);

        let reply = next_chunk(&mut body).await;
        assert!(reply.contains("event: message"));
        assert!(reply.contains("annas-mcp"));

        let initialized = app
            .oneshot(post(&session_id, INITIALIZED))
            .await
            .unwrap_or_else(|e| panic!("oneshot: {e}"));
        assert_eq!(initialized.status(), StatusCode::ACCEPTED);

        drop(body);
        for _ in 0..50 {
            if sessions.read().await.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("session was not removed after the stream closed");
    }
}
