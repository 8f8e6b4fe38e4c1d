//! MCP transport layer for stdio, legacy SSE, and Streamable HTTP.
//!
//! Every connection gets a server instance built by a [`SessionFactory`] from
//! configuration resolved for that connection alone.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::server::{AnnasMcpServer, ServerFactory};
use super::sse;
use crate::config::{ConfigResolver, QueryParams};
use crate::error::{ConfigError, Result, TransportError};
use crate::http::{self, AuthGate};

tokio::task_local! {
    /// Query parameters of the HTTP request currently being handled.
    static REQUEST_QUERY: QueryParams;
}

/// Transport a process serves, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Single client over stdin/stdout.
    Local,
    /// Legacy HTTP+SSE.
    Sse,
    /// MCP Streamable HTTP.
    Streamable,
}

impl TransportKind {
    /// Parses a transport name for the HTTP server, rejecting the local
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTransport`] for unknown names and for
    /// `stdio`/`local`.
    pub fn remote(name: &str) -> std::result::Result<Self, ConfigError> {
        match name.parse()? {
            Self::Local => Err(ConfigError::InvalidTransport {
                name: name.to_string(),
            }),
            kind => Ok(kind),
        }
    }

    /// Returns the canonical name of the transport.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "stdio",
            Self::Sse => "sse",
            Self::Streamable => "streamable",
        }
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" | "local" => Ok(Self::Local),
            "sse" => Ok(Self::Sse),
            "streamable" => Ok(Self::Streamable),
            _ => Err(ConfigError::InvalidTransport {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves per-connection configuration and builds a server from it.
#[derive(Clone, Debug)]
pub struct SessionFactory {
    resolver: ConfigResolver,
    factory: ServerFactory,
}

impl SessionFactory {
    /// Combines a resolver with a server factory.
    pub const fn new(resolver: ConfigResolver, factory: ServerFactory) -> Self {
        Self { resolver, factory }
    }

    /// Builds a server for a connection carrying `query` (`None` in local
    /// mode).
    ///
    /// A missing secret key does not fail the connection; the download tool
    /// reports it when called.
    pub fn build_for(&self, query: Option<&QueryParams>) -> AnnasMcpServer {
        self.factory
            .build(self.resolver.resolve_or_unauthenticated(query))
    }
}

/// Options for [`serve_http`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// HTTP transport flavor.
    pub transport: TransportKind,
}

impl HttpOptions {
    /// Returns the `host:port` listen address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Starts the MCP server with stdio transport.
///
/// Configuration comes from the environment only. The server runs until
/// stdin closes.
///
/// # Errors
///
/// Returns an error if the session fails to initialize or terminates
/// abnormally.
pub async fn serve_stdio(sessions: &SessionFactory) -> Result<()> {
    let server = sessions.build_for(None);
    info!("Starting MCP server on stdio");

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| TransportError::Session(e.to_string()))?;
    let reason = service
        .waiting()
        .await
        .map_err(|e| TransportError::Session(e.to_string()))?;

    info!(reason = ?reason, "MCP stdio session ended");
    Ok(())
}

async fn scope_request_query(request: Request, next: Next) -> Response {
    let query = QueryParams::from_uri(request.uri());
    REQUEST_QUERY.scope(query, next.run(request)).await
}

/// Builds the `/mcp` routes for the Streamable HTTP transport.
///
/// The service calls its factory while handling the session-establishing
/// request, so the factory reads that request's query from a task-local
/// scope instead of any shared state.
pub fn streamable_router(sessions: SessionFactory, ct: CancellationToken) -> Router {
    let service = StreamableHttpService::new(
        move || {
            let query = REQUEST_QUERY.try_with(Clone::clone).ok();
            if query.is_none() {
                warn!("Streamable session created outside a request scope");
            }
            Ok(sessions.build_for(query.as_ref()))
        },
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            cancellation_token: ct,
            ..Default::default()
        },
    );

    Router::new()
        .nest_service("/mcp", service)
        .route_layer(middleware::from_fn(scope_request_query))
}

/// Builds the protocol routes for an HTTP transport.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTransport`] for [`TransportKind::Local`].
pub fn mcp_router(
    transport: TransportKind,
    sessions: SessionFactory,
    ct: CancellationToken,
) -> std::result::Result<Router, ConfigError> {
    match transport {
        TransportKind::Streamable => Ok(streamable_router(sessions, ct)),
        TransportKind::Sse => Ok(sse::router(sessions, ct)),
        TransportKind::Local => Err(ConfigError::InvalidTransport {
            name: transport.to_string(),
        }),
    }
}

/// Starts the HTTP server and serves until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the transport is not an HTTP transport, the address
/// cannot be bound, or the server fails.
pub async fn serve_http(options: &HttpOptions, sessions: SessionFactory, gate: AuthGate) -> Result<()> {
    let ct = CancellationToken::new();
    let mcp = mcp_router(options.transport, sessions, ct.child_token())?;
    let app = http::router(mcp, gate);

    let addr = options.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| TransportError::Listen {
            addr: addr.clone(),
            source,
        })?;

    info!(
        addr = %addr,
        transport = %options.transport,
        endpoint = "/mcp",
        "Starting HTTP server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down HTTP server");
            ct.cancel();
        })
        .await
        .map_err(TransportError::Serve)?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;
    use crate::mcp::server::tests::FakeArchive;

    #[test_case("stdio", TransportKind::Local ; "stdio")]
    #[test_case("local", TransportKind::Local ; "local")]
    #[test_case("sse", TransportKind::Sse ; "sse")]
    #[test_case("streamable", TransportKind::Streamable ; "streamable")]
    #[test_case(" SSE ", TransportKind::Sse ; "case and whitespace")]
    fn test_parse_transport(name: &str, expected: TransportKind) {
        assert_eq!(name.parse::<TransportKind>(), Ok(expected));
    }

    #[test_case("websocket" ; "unknown")]
    #[test_case("" ; "empty")]
    #[test_case("stdio" ; "local rejected for http")]
    fn test_remote_rejects(name: &str) {
        assert_eq!(
            TransportKind::remote(name),
            Err(ConfigError::InvalidTransport {
                name: name.to_string()
            })
        );
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [TransportKind::Local, TransportKind::Sse, TransportKind::Streamable] {
            assert_eq!(kind.to_string().parse::<TransportKind>(), Ok(kind));
        }
    }

    fn sessions(env: &[(&str, &str)]) -> SessionFactory {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SessionFactory::new(
            ConfigResolver::new(Arc::new(env)),
            ServerFactory::new(Arc::new(FakeArchive::default())),
        )
    }

    #[test]
    fn test_build_for_prefers_query() {
        let sessions = sessions(&[("ANNAS_SECRET_KEY", "env")]);
        let query: QueryParams = [("secretKey", "query")].into_iter().collect();

        let server = sessions.build_for(Some(&query));
        assert_eq!(server.config().secret_key(), Some("query"));

        let local = sessions.build_for(None);
        assert_eq!(local.config().secret_key(), Some("env"));
    }

    #[test]
    fn test_build_for_degrades_without_secret() {
        let server = sessions(&[]).build_for(None);
        assert_eq!(server.config().secret_key(), None);
    }

    #[tokio::test]
    async fn test_task_local_scope_isolates_queries() {
        let sessions = sessions(&[]);
        let a: QueryParams = [("secretKey", "a")].into_iter().collect();
        let b: QueryParams = [("secretKey", "b")].into_iter().collect();

        let build = |sessions: SessionFactory| async move {
            tokio::task::yield_now().await;
            let query = REQUEST_QUERY.try_with(Clone::clone).ok();
            sessions.build_for(query.as_ref())
        };

        let (server_a, server_b) = tokio::join!(
            REQUEST_QUERY.scope(a, build(sessions.clone())),
            REQUEST_QUERY.scope(b, build(sessions.clone())),
        );
        assert_eq!(server_a.config().secret_key(), Some("a"));
        assert_eq!(server_b.config().secret_key(), Some("b"));
        assert!(REQUEST_QUERY.try_with(|_| ()).is_err());
    }

    #[test]
    fn test_mcp_router_rejects_local() {
        let result = mcp_router(TransportKind::Local, sessions(&[]), CancellationToken::new());
        assert!(result.is_err());
    }
}
