//! Error types for annas-mcp.
//!
//! Each concern owns a `thiserror` enum; [`Error`] aggregates them for the
//! CLI and transport entry points.
//!
//! Error messages never include the secret key or bearer tokens.

use thiserror::Error;

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for CLI commands and server entry points.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport failed to start or serve.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The archive client failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Command output could not be serialized.
    #[error("failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure outside a transport (runtime creation, stdout).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration resolution and startup validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No secret key was found in any source tier.
    #[error(
        "secret key is not configured: pass secretKey as a query parameter or set \
         ANNAS_SECRET_KEY, secretKey, or SECRET_KEY"
    )]
    MissingCredential,

    /// The requested transport name is not recognized.
    #[error("invalid transport type: {name} (must be 'sse' or 'streamable')")]
    InvalidTransport {
        /// The rejected transport name.
        name: String,
    },
}

/// Transport startup and serving errors.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The listening socket could not be bound.
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        /// Address that failed to bind.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),

    /// A protocol session failed to start or terminated abnormally.
    #[error("MCP session failed: {0}")]
    Session(String),
}

/// Errors raised by archive clients.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The HTTP request could not be sent or its body not read.
    #[error("archive request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The archive answered with a non-success status.
    #[error("archive returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The archive API reported an error in its response body.
    #[error("archive API error: {message}")]
    Api {
        /// Error message from the API.
        message: String,
    },

    /// The archive response was missing expected data.
    #[error("invalid archive response: {message}")]
    InvalidResponse {
        /// Description of what was missing.
        message: String,
    },

    /// A search-page pattern failed to compile.
    #[error("search page pattern error: {0}")]
    Parser(#[from] regex::Error),
}
