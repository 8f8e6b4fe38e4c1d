//! Output formatting for CLI commands.

use serde::Serialize;
use serde_json::json;

use crate::archive::{Document, DownloadOutcome, DownloadRequest};
use crate::error::Result;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, falling back to text for unknown names.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn to_json<T: Serialize>(self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}

/// Formats search results.
pub fn format_documents(documents: &[Document], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => format.to_json(&json!({ "books": documents })),
        OutputFormat::Text if documents.is_empty() => Ok("No books found.".to_string()),
        OutputFormat::Text => Ok(documents
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("Book {}:\n{doc}", i + 1))
            .collect::<Vec<_>>()
            .join("\n\n")),
    }
}

/// Formats the result of a download.
pub fn format_download(
    request: &DownloadRequest,
    outcome: &DownloadOutcome,
    format: OutputFormat,
) -> Result<String> {
    match (format, outcome) {
        (OutputFormat::Text, DownloadOutcome::Location(url)) => Ok(format!("Download URL: {url}")),
        (OutputFormat::Text, DownloadOutcome::Stored(path)) => {
            Ok(format!("Saved to: {}", path.display()))
        }
        (OutputFormat::Json, DownloadOutcome::Location(url)) => {
            format.to_json(&json!({ "hash": request.hash, "url": url }))
        }
        (OutputFormat::Json, DownloadOutcome::Stored(path)) => {
            format.to_json(&json!({ "hash": request.hash, "path": path }))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn doc(hash: &str, title: &str) -> Document {
        Document {
            hash: hash.to_string(),
            title: title.to_string(),
            authors: None,
            publisher: None,
            details: None,
            url: format!("https://annas-archive.org/md5/{hash}"),
        }
    }

    fn request() -> DownloadRequest {
        DownloadRequest {
            hash: "abc".to_string(),
            title: String::new(),
            format: String::new(),
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_text_numbers_books() {
        let text = format_documents(&[doc("a", "One"), doc("b", "Two")], OutputFormat::Text)
            .unwrap_or_else(|e| panic!("format: {e}"));
        assert!(text.starts_with("Book 1:\nTitle: One"));
        assert!(text.contains("\n\nBook 2:\nTitle: Two"));
    }

    #[test]
    fn test_empty_results() {
        let text = format_documents(&[], OutputFormat::Text)
            .unwrap_or_else(|e| panic!("format: {e}"));
        assert_eq!(text, "No books found.");

        let json = format_documents(&[], OutputFormat::Json)
            .unwrap_or_else(|e| panic!("format: {e}"));
        let value: serde_json::Value =
            serde_json::from_str(&json).unwrap_or_else(|e| panic!("json: {e}"));
        assert_eq!(value["books"], json!([]));
    }

    #[test]
    fn test_download_text() {
        let text = format_download(
            &request(),
            &DownloadOutcome::Location("https://cdn.example/x".to_string()),
            OutputFormat::Text,
        )
        .unwrap_or_else(|e| panic!("format: {e}"));
        assert_eq!(text, "Download URL: https://cdn.example/x");

        let text = format_download(
            &request(),
            &DownloadOutcome::Stored(PathBuf::from("/tmp/x.pdf")),
            OutputFormat::Text,
        )
        .unwrap_or_else(|e| panic!("format: {e}"));
        assert_eq!(text, "Saved to: /tmp/x.pdf");
    }

    #[test]
    fn test_download_json() {
        let json = format_download(
            &request(),
            &DownloadOutcome::Location("https://cdn.example/x".to_string()),
            OutputFormat::Json,
        )
        .unwrap_or_else(|e| panic!("format: {e}"));
        let value: serde_json::Value =
            serde_json::from_str(&json).unwrap_or_else(|e| panic!("json: {e}"));
        assert_eq!(value["url"], "https://cdn.example/x");
        assert_eq!(value["hash"], "abc");
    }
}
