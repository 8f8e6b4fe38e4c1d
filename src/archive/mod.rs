//! Archive client abstraction.
//!
//! The MCP tools and CLI commands talk to the upstream archive only through
//! the [`ArchiveClient`] trait. [`AnnasArchiveClient`] is the HTTP
//! implementation used by the binary; tests substitute in-memory fakes.

mod http;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

pub use http::{AnnasArchiveClient, DEFAULT_BASE_URL};

/// A document record returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// MD5 hash identifying the document.
    pub hash: String,
    /// Document title.
    pub title: String,
    /// Authors, as displayed by the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    /// Publisher line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Language, format, and size summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Landing page of the document.
    pub url: String,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title: {}", self.title)?;
        if let Some(authors) = &self.authors {
            writeln!(f, "Authors: {authors}")?;
        }
        if let Some(publisher) = &self.publisher {
            writeln!(f, "Publisher: {publisher}")?;
        }
        if let Some(details) = &self.details {
            writeln!(f, "Details: {details}")?;
        }
        writeln!(f, "URL: {}", self.url)?;
        write!(f, "Hash: {}", self.hash)
    }
}

/// Identifies a document to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// MD5 hash of the document.
    pub hash: String,
    /// Title, used when rendering the download link.
    pub title: String,
    /// File format, for example `pdf` or `epub`.
    pub format: String,
}

/// Returns `true` if `hash` looks like an MD5 hex digest.
pub fn is_md5(hash: &str) -> bool {
    hash.len() == 32 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Outcome of a download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The archive resolved a location the caller can fetch.
    Location(String),
    /// The client transferred the document to local storage.
    Stored(PathBuf),
}

/// Capability to search and retrieve documents from the upstream archive.
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// Searches for documents matching `term`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on network failures or unexpected responses.
    async fn search(&self, term: &str) -> Result<Vec<Document>, ArchiveError>;

    /// Resolves or performs a download using `secret_key`.
    ///
    /// Clients that transfer files write them below `download_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on network failures, rejected keys, or
    /// unexpected responses.
    async fn download(
        &self,
        request: &DownloadRequest,
        secret_key: &str,
        download_dir: &Path,
    ) -> Result<DownloadOutcome, ArchiveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document {
            hash: "0123456789abcdef0123456789abcdef".to_string(),
            title: "The Rust Programming Language".to_string(),
            authors: Some("Steve Klabnik, Carol Nichols".to_string()),
            publisher: None,
            details: Some("English [en], epub, 3.1MB".to_string()),
            url: "https://annas-archive.org/md5/0123456789abcdef0123456789abcdef".to_string(),
        }
    }

    #[test]
    fn test_document_display_skips_missing_fields() {
        let text = sample().to_string();
        assert!(text.starts_with("Title: The Rust Programming Language\n"));
        assert!(text.contains("Authors: Steve Klabnik"));
        assert!(!text.contains("Publisher:"));
        assert!(text.ends_with("Hash: 0123456789abcdef0123456789abcdef"));
    }

    #[test]
    fn test_document_json_omits_none() {
        let json = serde_json::to_value(sample()).unwrap_or_default();
        assert!(json.get("publisher").is_none());
        assert_eq!(json["title"], "The Rust Programming Language");
    }

    #[test]
    fn test_is_md5() {
        assert!(is_md5("0123456789abcdef0123456789ABCDEF"));
        assert!(!is_md5("0123456789abcdef"));
        assert!(!is_md5("0123456789abcdef0123456789abcdeg"));
        assert!(!is_md5("../../etc/passwd/../../../../xxxx"));
    }
}
