//! Discovery documents served under `/.well-known/`.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::config::DEFAULT_DOWNLOAD_PATH;
use crate::mcp::SERVER_NAME;

const CARD_CACHE_CONTROL: &str = "public, max-age=3600";

/// JSON schema describing the per-connection configuration parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSchema {
    title: &'static str,
    description: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    required: [&'static str; 1],
    additional_properties: bool,
    properties: ConfigProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigProperties {
    secret_key: SchemaProperty,
    download_path: SchemaProperty,
}

#[derive(Debug, Clone, Serialize)]
struct SchemaProperty {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<&'static str>,
}

impl ConfigSchema {
    /// Returns the schema for this server.
    pub const fn current() -> Self {
        Self {
            title: "Anna's Archive MCP Configuration",
            description: "Configuration for connecting to Anna's Archive MCP server",
            kind: "object",
            required: ["secretKey"],
            additional_properties: false,
            properties: ConfigProperties {
                secret_key: SchemaProperty {
                    kind: "string",
                    title: "Anna's Archive API Key",
                    description: "Your Anna's Archive API key for accessing the JSON API. \
                                  Get one at https://annas-archive.org/faq#api",
                    default: None,
                },
                download_path: SchemaProperty {
                    kind: "string",
                    title: "Download Path",
                    description: "Path where downloaded documents will be stored",
                    default: Some(DEFAULT_DOWNLOAD_PATH),
                },
            },
        }
    }
}

/// Server card advertising identity, tools, and authentication.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCard {
    name: &'static str,
    description: &'static str,
    version: &'static str,
    capabilities: CardCapabilities,
    authentication: CardAuthentication,
}

#[derive(Debug, Clone, Serialize)]
struct CardCapabilities {
    tools: [CardTool; 2],
}

#[derive(Debug, Clone, Serialize)]
struct CardTool {
    name: &'static str,
    description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct CardAuthentication {
    #[serde(rename = "type")]
    kind: &'static str,
    oauth: OAuthEndpoints,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct OAuthEndpoints {
    authorization_url: &'static str,
    token_url: &'static str,
    scopes: [&'static str; 1],
}

impl ServerCard {
    /// Returns the card for this server.
    pub const fn current() -> Self {
        Self {
            name: SERVER_NAME,
            description: "Search and download documents from Anna's Archive",
            version: env!("CARGO_PKG_VERSION"),
            capabilities: CardCapabilities {
                tools: [
                    CardTool {
                        name: "search",
                        description: "Search books on Anna's Archive",
                    },
                    CardTool {
                        name: "download",
                        description: "Download a book by its MD5 hash",
                    },
                ],
            },
            authentication: CardAuthentication {
                kind: "oauth2",
                oauth: OAuthEndpoints {
                    authorization_url: "https://smithery.ai/oauth/authorize",
                    token_url: "https://smithery.ai/oauth/token",
                    scopes: ["mcp:access"],
                },
            },
        }
    }

    /// Names of the advertised tools.
    pub fn tool_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.capabilities.tools.iter().map(|t| t.name)
    }
}

/// Serializes `document`, answering 500 if that fails.
fn json_document<T: Serialize>(document: &T, what: &str) -> Response {
    match serde_json::to_value(document) {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            error!(document = what, error = %e, "Failed to encode discovery document");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /.well-known/mcp-config`
pub async fn config_schema() -> Response {
    json_document(&ConfigSchema::current(), "config schema")
}

/// `GET /.well-known/mcp-server-card.json`
pub async fn server_card() -> Response {
    let mut response = json_document(&ServerCard::current(), "server card");
    if response.status().is_success() {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CARD_CACHE_CONTROL),
        );
    }
    response
}
