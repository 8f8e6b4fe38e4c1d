//! MCP (Model Context Protocol) server for annas-mcp.
//!
//! Exposes archive search and download as MCP tools over stdio, legacy SSE,
//! or Streamable HTTP.
//!
//! # Architecture
//!
//! ```text
//! MCP Client
//!   ↓ connect (query string carries secretKey / downloadPath)
//! SessionFactory
//!   ├── ConfigResolver → Configuration (per connection)
//!   └── ServerFactory  → AnnasMcpServer
//!   ↓ search(term) / download(hash, title, format)
//! ArchiveClient
//! ```

pub mod params;
pub mod server;
mod sse;
pub mod transport;

pub use params::{DownloadParams, SearchParams};
pub use server::{AnnasMcpServer, SERVER_NAME, ServerFactory};
pub use transport::{
    HttpOptions, SessionFactory, TransportKind, mcp_router, serve_http, serve_stdio,
    streamable_router,
};
