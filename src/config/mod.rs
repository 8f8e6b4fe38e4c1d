//! Per-connection configuration and its layered resolution.
//!
//! A [`Configuration`] is resolved independently for every connection and
//! handed by value to the server factory. Resolution only ever reads the
//! environment; nothing is written back to process-wide state, so concurrent
//! HTTP sessions carrying different credentials cannot observe each other.
//!
//! # Precedence
//!
//! Each field is resolved independently, first non-empty value wins:
//!
//! | Tier | `secretKey` | `downloadPath` |
//! |------|-------------|----------------|
//! | 1 | query `secretKey`, `ANNAS_SECRET_KEY` | query `downloadPath`, `ANNAS_DOWNLOAD_PATH` |
//! | 2 | env `ANNAS_SECRET_KEY` | env `ANNAS_DOWNLOAD_PATH` |
//! | 3 | env `secretKey` | env `downloadPath` |
//! | 4 | env `SECRET_KEY` | default `/tmp/downloads` |

mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ConfigError;

pub use source::{
    DOWNLOAD_PATH_CHAIN, EnvSource, ProcessEnv, QueryParams, SECRET_KEY_CHAIN, Source,
};

/// Download directory used when no source provides one.
pub const DEFAULT_DOWNLOAD_PATH: &str = "/tmp/downloads";

/// Resolved, immutable configuration for one connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    secret_key: String,
    download_path: PathBuf,
}

impl Configuration {
    /// Creates a configuration from explicit values.
    pub fn new(secret_key: impl Into<String>, download_path: impl Into<PathBuf>) -> Self {
        Self {
            secret_key: secret_key.into(),
            download_path: download_path.into(),
        }
    }

    /// Creates a configuration without a secret key.
    ///
    /// Servers built from it can search but every download fails with
    /// [`ConfigError::MissingCredential`].
    pub fn unauthenticated(download_path: impl Into<PathBuf>) -> Self {
        Self::new(String::new(), download_path)
    }

    /// Returns the secret key, or `None` when it is empty.
    pub fn secret_key(&self) -> Option<&str> {
        Some(self.secret_key.as_str()).filter(|k| !k.is_empty())
    }

    /// Returns the download directory.
    pub fn download_path(&self) -> &Path {
        &self.download_path
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = if self.secret_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Configuration")
            .field("secret_key", &secret)
            .field("download_path", &self.download_path)
            .finish()
    }
}

/// Resolves [`Configuration`] values from query parameters and environment.
///
/// The resolver is stateless apart from its read-only [`EnvSource`] and can be
/// shared freely between connections.
#[derive(Clone)]
pub struct ConfigResolver {
    env: Arc<dyn EnvSource>,
}

impl ConfigResolver {
    /// Creates a resolver reading from `env`.
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self { env }
    }

    /// Creates a resolver reading from the process environment.
    pub fn from_process_env() -> Self {
        Self::new(Arc::new(ProcessEnv))
    }

    /// Resolves the configuration for one connection.
    ///
    /// `query` carries the request's query parameters in HTTP modes and is
    /// `None` in local mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] if no tier yields a secret
    /// key. A missing download path never fails; it falls back to
    /// [`DEFAULT_DOWNLOAD_PATH`].
    pub fn resolve(&self, query: Option<&QueryParams>) -> Result<Configuration, ConfigError> {
        let download_path = self.resolve_download_path(query);

        let Some((source, secret_key)) =
            source::first_present(SECRET_KEY_CHAIN, query, self.env.as_ref())
        else {
            return Err(ConfigError::MissingCredential);
        };
        debug!(source = %source, "Resolved secret key");

        Ok(Configuration::new(secret_key, download_path))
    }

    /// Resolves the configuration, degrading to an unauthenticated one when no
    /// secret key is available.
    ///
    /// Used when building protocol servers: search keeps working and the
    /// download tool reports the missing credential when invoked.
    pub fn resolve_or_unauthenticated(&self, query: Option<&QueryParams>) -> Configuration {
        self.resolve(query).unwrap_or_else(|e| {
            warn!(error = %e, "No secret key resolved, download tool will be unavailable");
            Configuration::unauthenticated(self.resolve_download_path(query))
        })
    }

    fn resolve_download_path(&self, query: Option<&QueryParams>) -> PathBuf {
        match source::first_present(DOWNLOAD_PATH_CHAIN, query, self.env.as_ref()) {
            Some((source, path)) => {
                debug!(source = %source, path = %path, "Resolved download path");
                PathBuf::from(path)
            }
            None => PathBuf::from(DEFAULT_DOWNLOAD_PATH),
        }
    }
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver").finish_non_exhaustive()
    }
}
