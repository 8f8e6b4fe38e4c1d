//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

/// Port used when `PORT` is unset or invalid.
pub const DEFAULT_PORT: u16 = 8080;

/// Returns the default HTTP port: `PORT` when it holds a positive number,
/// otherwise [`DEFAULT_PORT`].
pub fn default_port() -> u16 {
    port_from(std::env::var("PORT").ok().as_deref())
}

fn port_from(value: Option<&str>) -> u16 {
    value
        .and_then(|v| v.trim().parse::<u16>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_PORT)
}

/// annas-mcp: Anna's Archive MCP server and CLI.
///
/// Searches Anna's Archive and resolves downloads from the command line, or
/// serves both operations to MCP clients over stdio or HTTP.
#[derive(Parser, Debug)]
#[command(name = "annas-mcp")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level implied by `-v` and `-q`.
    pub const fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for books.
    #[command(after_help = r#"Examples:
  annas-mcp search "rust programming"
  annas-mcp --format json search dune | jq '.books[].hash'
"#)]
    Search {
        /// Search term.
        term: String,
    },

    /// Get the download URL for a book by its MD5 hash.
    ///
    /// Requires `ANNAS_SECRET_KEY` (or `secretKey` / `SECRET_KEY`) in the
    /// environment or a `.env` file.
    #[command(after_help = r#"Examples:
  ANNAS_SECRET_KEY=... annas-mcp download 0123456789abcdef0123456789abcdef
  annas-mcp download <hash> --title "Dune" --file-format epub
"#)]
    Download {
        /// MD5 hash of the book.
        hash: String,

        /// Book title, used when labelling the result.
        #[arg(long, default_value = "")]
        title: String,

        /// Book file format, for example pdf or epub.
        #[arg(long, default_value = "")]
        file_format: String,
    },

    /// Start the MCP server on stdio.
    ///
    /// Reads JSON-RPC messages from stdin and writes responses to stdout.
    #[command(after_help = r#"Examples:
  annas-mcp mcp
"#)]
    Mcp,

    /// Start the MCP server with an HTTP transport.
    ///
    /// Serves /mcp plus health and discovery endpoints. Remote clients pass
    /// secretKey and downloadPath as query parameters on /mcp.
    #[command(after_help = r#"Examples:
  annas-mcp http                              # 0.0.0.0:$PORT or 8080, streamable
  annas-mcp http --transport sse --port 3000
"#)]
    Http {
        /// Interface to bind.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to bind (defaults to $PORT, then 8080).
        #[arg(long, default_value_t = default_port())]
        port: u16,

        /// Transport: streamable or sse.
        #[arg(long, default_value = "streamable")]
        transport: String,
    },
}
