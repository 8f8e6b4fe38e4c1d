//! annas-mcp: Anna's Archive MCP server and CLI.
//!
//! Exposes two document-retrieval operations, `search` and `download`, to
//! MCP clients over stdio, legacy SSE, or Streamable HTTP, and to humans via
//! the command line.
//!
//! # Architecture
//!
//! Every connection resolves its own [`config::Configuration`] from the
//! request's query string and the environment, then gets a fresh
//! [`mcp::AnnasMcpServer`] whose tools are closed over it. Nothing resolved
//! for one connection is written to process-wide state.
//!
//! # Modules
//!
//! - [`archive`]: archive client trait and HTTP implementation
//! - [`cli`]: command-line interface
//! - [`config`]: layered configuration resolution
//! - [`error`]: error types
//! - [`http`]: HTTP front (auth gate, discovery, CORS)
//! - [`mcp`]: MCP server, factory, and transports

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod mcp;

pub use error::{Error, Result};
