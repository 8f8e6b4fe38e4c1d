//! CLI layer for annas-mcp.
//!
//! Provides the command-line interface using clap, with commands for
//! searching, downloading, and running the MCP server.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, DEFAULT_PORT, default_port};
