//! Command implementations.
//!
//! Each command returns its output as a string; `main` prints it. Commands
//! that need async work build their own Tokio runtime.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::info;

use super::output::{OutputFormat, format_documents, format_download};
use super::parser::{Cli, Commands};
use crate::archive::{AnnasArchiveClient, ArchiveClient, DownloadRequest};
use crate::config::{ConfigResolver, ProcessEnv};
use crate::error::{ConfigError, Result};
use crate::http::AuthGate;
use crate::mcp::{HttpOptions, ServerFactory, SessionFactory, TransportKind, serve_http, serve_stdio};

/// Executes the parsed command and returns its output.
///
/// # Errors
///
/// Returns an error if the command fails.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Search { term } => cmd_search(term, format),
        Commands::Download {
            hash,
            title,
            file_format,
        } => {
            let request = DownloadRequest {
                hash: hash.trim().to_ascii_lowercase(),
                title: title.clone(),
                format: file_format.clone(),
            };
            cmd_download(&request, format)
        }
        Commands::Mcp => cmd_mcp(),
        Commands::Http {
            host,
            port,
            transport,
        } => cmd_http(host, *port, transport),
    }
}

fn runtime() -> Result<Runtime> {
    Ok(Runtime::new()?)
}

fn archive_client() -> Result<AnnasArchiveClient> {
    Ok(AnnasArchiveClient::from_env(&ProcessEnv)?)
}

fn session_factory() -> Result<SessionFactory> {
    let archive: Arc<dyn ArchiveClient> = Arc::new(archive_client()?);
    Ok(SessionFactory::new(
        ConfigResolver::from_process_env(),
        ServerFactory::new(archive),
    ))
}

fn cmd_search(term: &str, format: OutputFormat) -> Result<String> {
    info!(term = %term, "Search command called");
    let client = archive_client()?;

    let documents = runtime()?.block_on(client.search(term))?;

    info!(term = %term, results = documents.len(), "Search command completed");
    format_documents(&documents, format)
}

fn cmd_download(request: &DownloadRequest, format: OutputFormat) -> Result<String> {
    info!(hash = %request.hash, "Download command called");

    let config = ConfigResolver::from_process_env().resolve(None)?;
    let secret_key = config
        .secret_key()
        .ok_or(ConfigError::MissingCredential)?;
    let client = archive_client()?;

    let outcome = runtime()?.block_on(client.download(
        request,
        secret_key,
        config.download_path(),
    ))?;

    info!(hash = %request.hash, "Download command completed");
    format_download(request, &outcome, format)
}

fn cmd_mcp() -> Result<String> {
    let sessions = session_factory()?;
    runtime()?.block_on(serve_stdio(&sessions))?;
    Ok(String::new())
}

fn cmd_http(host: &str, port: u16, transport: &str) -> Result<String> {
    // Reject unknown transports before touching the network.
    let transport = TransportKind::remote(transport)?;
    let options = HttpOptions {
        host: host.to_string(),
        port,
        transport,
    };
    let gate = AuthGate::from_env(&ProcessEnv);
    let sessions = session_factory()?;

    runtime()?.block_on(serve_http(&options, sessions, gate))?;
    Ok(String::new())
}
