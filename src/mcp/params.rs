//! Arguments of the `search` and `download` tools.
//!
//! The `JsonSchema` derives become each tool's advertised input schema.
//! Optional download fields default to empty when a client omits them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Term to search for.
    pub term: String,
}

/// Parameters for the `download` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadParams {
    /// MD5 hash of the book to download.
    pub hash: String,

    /// Book title, used for the returned link.
    #[serde(default)]
    pub title: String,

    /// Book format, for example `pdf` or `epub`.
    #[serde(default)]
    pub format: String,
}
