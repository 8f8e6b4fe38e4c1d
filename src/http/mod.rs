//! HTTP front for the remote transports.
//!
//! Mounts the protocol routes behind the [`AuthGate`] next to the public
//! health, discovery, and OAuth callback routes, and wraps everything in a
//! permissive CORS layer that answers preflight requests before any gate
//! runs.
//!
//! | Route | Auth |
//! |-------|------|
//! | `/mcp` | [`AuthGate`] |
//! | `/health` | none |
//! | `/.well-known/mcp-config` | none |
//! | `/.well-known/mcp-server-card.json`, `/.well-known/mcp/server-card.json` | none |
//! | `/oauth/callback` | none |

pub mod auth;
pub mod discovery;

use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Query;
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

pub use auth::{AcceptAnyToken, AuthGate, AuthRejection, StaticTokenVerifier, TokenVerifier};
pub use discovery::{ConfigSchema, ServerCard};

const MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");
const MCP_PROTOCOL_VERSION: HeaderName = HeaderName::from_static("mcp-protocol-version");

/// Builds the full application router around the protocol routes `mcp`.
pub fn router(mcp: Router, gate: AuthGate) -> Router {
    let mcp = mcp.route_layer(middleware::from_fn_with_state(gate, auth::require_bearer));

    Router::new()
        .route("/health", get(health))
        .route("/.well-known/mcp-config", get(discovery::config_schema))
        .route("/.well-known/mcp-server-card.json", get(discovery::server_card))
        .route("/.well-known/mcp/server-card.json", get(discovery::server_card))
        .route("/oauth/callback", get(oauth_callback))
        .merge(mcp)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            MCP_SESSION_ID,
            MCP_PROTOCOL_VERSION,
        ])
        .expose_headers([MCP_SESSION_ID])
        .max_age(Duration::from_secs(3600))
}

/// First characters of a credential, safe to log.
pub(crate) fn safe_prefix(secret: &str) -> String {
    let prefix: String = secret.chars().take(10).collect();
    format!("{prefix}...")
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Serialize)]
struct CallbackAck {
    status: &'static str,
    message: &'static str,
}

/// Acknowledges an OAuth redirect. The code is never exchanged.
async fn oauth_callback(Query(query): Query<CallbackQuery>) -> Response {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        warn!("OAuth callback missing code parameter");
        return (StatusCode::BAD_REQUEST, "Missing authorization code").into_response();
    };

    info!(code_prefix = %safe_prefix(&code), "OAuth callback received");
    Json(CallbackAck {
        status: "success",
        message: "OAuth authorization successful",
    })
    .into_response()
}
