//! HTTP client for Anna's Archive.
//!
//! Search scrapes document links from the public search page; downloads go
//! through the JSON fast-download API, which needs the member secret key.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::{ArchiveClient, Document, DownloadOutcome, DownloadRequest};
use crate::config::EnvSource;
use crate::error::ArchiveError;

/// Archive base URL used when `ANNAS_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://annas-archive.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Body of the fast-download API response.
#[derive(Debug, Deserialize)]
struct FastDownloadResponse {
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extracts document links from a search results page.
#[derive(Debug, Clone)]
struct SearchPage {
    link: Regex,
    tag: Regex,
    space: Regex,
}

impl SearchPage {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            link: Regex::new(r#"(?s)<a[^>]*href="/md5/([0-9a-fA-F]{32})"[^>]*>(.*?)</a>"#)?,
            tag: Regex::new(r"<[^>]*>")?,
            space: Regex::new(r"\s+")?,
        })
    }

    /// Returns one document per distinct hash, in page order.
    ///
    /// A result usually links its hash several times (cover, title); the
    /// first link with visible text supplies the title.
    fn parse(&self, html: &str, base_url: &str) -> Vec<Document> {
        let mut documents: Vec<Document> = Vec::new();

        for caps in self.link.captures_iter(html) {
            let hash = caps[1].to_ascii_lowercase();
            let text = self.tag.replace_all(&caps[2], " ");
            let title = self.space.replace_all(text.trim(), " ").into_owned();

            if let Some(existing) = documents.iter_mut().find(|d| d.hash == hash) {
                if existing.title.is_empty() {
                    existing.title = title;
                }
                continue;
            }

            documents.push(Document {
                url: format!("{base_url}/md5/{hash}"),
                hash,
                title,
                authors: None,
                publisher: None,
                details: None,
            });
        }

        documents
    }
}

/// [`ArchiveClient`] backed by the Anna's Archive website and JSON API.
#[derive(Debug, Clone)]
pub struct AnnasArchiveClient {
    http: reqwest::Client,
    base_url: String,
    page: SearchPage,
}

impl AnnasArchiveClient {
    /// Creates a client for the archive at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ArchiveError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page: SearchPage::new()?,
        })
    }

    /// Creates a client using `ANNAS_BASE_URL` or [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if the HTTP client cannot be constructed.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ArchiveError> {
        let base_url = env
            .var("ANNAS_BASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Returns the archive base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ArchiveClient for AnnasArchiveClient {
    async fn search(&self, term: &str) -> Result<Vec<Document>, ArchiveError> {
        let url = format!("{}/search", self.base_url);
        debug!(url = %url, term = %term, "Searching archive");

        let response = self.http.get(&url).query(&[("q", term)]).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Status {
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        Ok(self.page.parse(&html, &self.base_url))
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        secret_key: &str,
        _download_dir: &Path,
    ) -> Result<DownloadOutcome, ArchiveError> {
        let url = format!("{}/dyn/api/fast_download.json", self.base_url);
        debug!(hash = %request.hash, "Requesting fast download URL");

        let response = self
            .http
            .get(&url)
            .query(&[("md5", request.hash.as_str()), ("key", secret_key)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        // Error responses still carry a JSON body with an `error` message.
        let parsed: Option<FastDownloadResponse> = serde_json::from_str(&body).ok();
        if let Some(message) = parsed.as_ref().and_then(|p| p.error.clone()) {
            return Err(ArchiveError::Api { message });
        }
        if !status.is_success() {
            return Err(ArchiveError::Status {
                status: status.as_u16(),
            });
        }

        parsed
            .and_then(|p| p.download_url)
            .filter(|u| !u.is_empty())
            .map(DownloadOutcome::Location)
            .ok_or_else(|| ArchiveError::InvalidResponse {
                message: "response has no download_url".to_string(),
            })
    }
}
