//! MCP server implementation for annas-mcp.
//!
//! [`ServerFactory`] builds one [`AnnasMcpServer`] per connection. Each
//! instance owns the [`Configuration`] resolved for that connection, so tool
//! handlers never consult shared process state for credentials.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::params::{DownloadParams, SearchParams};
use crate::archive::{ArchiveClient, Document, DownloadOutcome, DownloadRequest, is_md5};
use crate::config::Configuration;
use crate::error::ConfigError;

/// Server name reported to clients and discovery documents.
pub const SERVER_NAME: &str = "annas-mcp";

/// Structured payload of the `search` tool.
#[derive(Serialize)]
struct SearchPayload<'a> {
    books: &'a [Document],
}

fn cancelled() -> McpError {
    McpError::internal_error("request cancelled", None)
}

/// Renders search results as human-readable text.
fn render_documents(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No books found.".to_string();
    }
    documents
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renders a download outcome for the tool result.
fn render_outcome(request: &DownloadRequest, outcome: &DownloadOutcome) -> String {
    let label = if request.title.is_empty() {
        request.hash.as_str()
    } else {
        request.title.as_str()
    };
    match outcome {
        DownloadOutcome::Location(url) => format!("[{label}]({url})"),
        DownloadOutcome::Stored(path) => format!("Saved {label} to {}", path.display()),
    }
}

/// Builds protocol-server instances bound to a resolved configuration.
///
/// The factory only holds the shared archive client handle; every call to
/// [`ServerFactory::build`] yields an independent server.
#[derive(Clone)]
pub struct ServerFactory {
    archive: Arc<dyn ArchiveClient>,
}

impl ServerFactory {
    /// Creates a factory whose servers delegate to `archive`.
    pub fn new(archive: Arc<dyn ArchiveClient>) -> Self {
        Self { archive }
    }

    /// Builds a server whose tools are closed over `config`.
    pub fn build(&self, config: Configuration) -> AnnasMcpServer {
        AnnasMcpServer {
            tool_router: AnnasMcpServer::tool_router(),
            config: Arc::new(config),
            archive: Arc::clone(&self.archive),
        }
    }
}

impl std::fmt::Debug for ServerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerFactory").finish_non_exhaustive()
    }
}

/// Anna's Archive MCP server exposing the `search` and `download` tools.
#[derive(Clone)]
pub struct AnnasMcpServer {
    tool_router: ToolRouter<Self>,
    config: Arc<Configuration>,
    archive: Arc<dyn ArchiveClient>,
}

#[tool_router]
impl AnnasMcpServer {
    /// Search the archive for books matching a term.
    #[tool(name = "search", description = "Search books on Anna's Archive")]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_search(params, &context.ct).await
    }

    /// Resolve a download for a book by MD5 hash.
    #[tool(
        name = "download",
        description = "Download a book by its MD5 hash. Requires a secret key, passed as the secretKey query parameter or set via ANNAS_SECRET_KEY."
    )]
    async fn download(
        &self,
        Parameters(params): Parameters<DownloadParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_download(params, &context.ct).await
    }
}

impl AnnasMcpServer {
    /// Returns the configuration this server was built with.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Returns the names of the registered tools.
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect()
    }

    async fn run_search(
        &self,
        params: SearchParams,
        ct: &CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let term = params.term.trim();
        if term.is_empty() {
            return Err(McpError::invalid_params("search term must not be empty", None));
        }
        info!(term = %term, "Search tool called");

        let documents = tokio::select! {
            () = ct.cancelled() => return Err(cancelled()),
            result = self.archive.search(term) => result.map_err(|e| {
                error!(term = %term, error = %e, "Search tool failed");
                McpError::internal_error(format!("Search failed: {e}"), None)
            })?,
        };

        info!(term = %term, results = documents.len(), "Search tool completed");

        let structured = serde_json::to_value(SearchPayload { books: &documents })
            .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;

        let mut result = CallToolResult::success(vec![Content::text(render_documents(&documents))]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    async fn run_download(
        &self,
        params: DownloadParams,
        ct: &CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        info!(
            hash = %params.hash,
            title = %params.title,
            format = %params.format,
            "Download tool called"
        );

        let Some(secret_key) = self.config.secret_key() else {
            error!(hash = %params.hash, "Download tool called without a secret key");
            return Err(McpError::invalid_params(
                ConfigError::MissingCredential.to_string(),
                None,
            ));
        };

        if !is_md5(&params.hash) {
            return Err(McpError::invalid_params(
                format!("Invalid MD5 hash: {}", params.hash),
                None,
            ));
        }

        let request = DownloadRequest {
            hash: params.hash.to_ascii_lowercase(),
            title: params.title,
            format: params.format,
        };

        let outcome = tokio::select! {
            () = ct.cancelled() => return Err(cancelled()),
            result = self.archive.download(&request, secret_key, self.config.download_path()) => {
                result.map_err(|e| {
                    error!(hash = %request.hash, error = %e, "Download tool failed");
                    McpError::internal_error(format!("Download failed: {e}"), None)
                })?
            }
        };

        info!(hash = %request.hash, "Download tool completed");

        Ok(CallToolResult::success(vec![Content::text(render_outcome(
            &request, &outcome,
        ))]))
    }
}

#[tool_handler]
impl ServerHandler for AnnasMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                title: Some("Anna's Archive MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: Some(env!("CARGO_PKG_REPOSITORY").to_string()),
            },
            instructions: Some(
                "Search Anna's Archive with the `search` tool, then pass a result's MD5 hash, \
                 title, and format to `download` to obtain a download link."
                    .to_string(),
            ),
        }
    }
}
