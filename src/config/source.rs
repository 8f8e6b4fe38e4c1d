//! Lookup sources for configuration resolution.
//!
//! A field is resolved by walking an ordered chain of [`Source`]s. Each
//! source is either a query parameter on the connection request or an
//! environment variable read through an [`EnvSource`].

use std::collections::HashMap;
use std::hash::BuildHasher;

use axum::extract::Query;
use axum::http::Uri;

/// Read-only access to environment variables.
///
/// Production code uses [`ProcessEnv`]; tests use a `HashMap` so that no test
/// ever writes to the process environment.
pub trait EnvSource: Send + Sync {
    /// Returns the value of `name`, or `None` if it is unset or not UTF-8.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<S> EnvSource for HashMap<String, String, S>
where
    S: BuildHasher + Send + Sync,
{
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Query parameters carried on a session-establishing HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    /// Parses the query string of `uri`.
    ///
    /// A malformed query string yields an empty parameter set.
    pub fn from_uri(uri: &Uri) -> Self {
        Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|Query(params)| Self(params))
            .unwrap_or_default()
    }

    /// Returns the value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One named lookup source in a resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A query parameter on the connection request.
    Query(&'static str),
    /// An environment variable.
    Env(&'static str),
}

impl Source {
    /// Looks the source up. Empty values count as absent.
    pub(crate) fn lookup(self, query: Option<&QueryParams>, env: &dyn EnvSource) -> Option<String> {
        let value = match self {
            Self::Query(name) => query.and_then(|q| q.get(name)).map(str::to_string),
            Self::Env(name) => env.var(name),
        };
        value.filter(|v| !v.is_empty())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query(name) => write!(f, "query parameter {name}"),
            Self::Env(name) => write!(f, "environment variable {name}"),
        }
    }
}

/// Resolution chain for the secret key, highest priority first.
pub const SECRET_KEY_CHAIN: &[Source] = &[
    Source::Query("secretKey"),
    Source::Query("ANNAS_SECRET_KEY"),
    Source::Env("ANNAS_SECRET_KEY"),
    Source::Env("secretKey"),
    Source::Env("SECRET_KEY"),
];

/// Resolution chain for the download path, highest priority first.
pub const DOWNLOAD_PATH_CHAIN: &[Source] = &[
    Source::Query("downloadPath"),
    Source::Query("ANNAS_DOWNLOAD_PATH"),
    Source::Env("ANNAS_DOWNLOAD_PATH"),
    Source::Env("downloadPath"),
];

/// Returns the first source in `chain` that yields a non-empty value.
pub(crate) fn first_present(
    chain: &[Source],
    query: Option<&QueryParams>,
    env: &dyn EnvSource,
) -> Option<(Source, String)> {
    chain
        .iter()
        .find_map(|source| source.lookup(query, env).map(|value| (*source, value)))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_from_uri() {
        let uri: Uri = "/mcp?secretKey=abc&downloadPath=%2Fdata%2Fbooks"
            .parse()
            .unwrap_or_else(|e| panic!("bad uri: {e}"));
        let params = QueryParams::from_uri(&uri);
        assert_eq!(params.get("secretKey"), Some("abc"));
        assert_eq!(params.get("downloadPath"), Some("/data/books"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_query_params_without_query() {
        let uri: Uri = "/mcp".parse().unwrap_or_else(|e| panic!("bad uri: {e}"));
        assert_eq!(QueryParams::from_uri(&uri), QueryParams::default());
    }

    #[test]
    fn test_empty_value_is_absent() {
        let query: QueryParams = [("secretKey", "")].into_iter().collect();
        let env: HashMap<String, String> =
            HashMap::from([("ANNAS_SECRET_KEY".to_string(), "from-env".to_string())]);
        let found = first_present(SECRET_KEY_CHAIN, Some(&query), &env);
        assert_eq!(
            found,
            Some((Source::Env("ANNAS_SECRET_KEY"), "from-env".to_string()))
        );
    }

    #[test]
    fn test_query_alias_order() {
        let query: QueryParams = [("ANNAS_SECRET_KEY", "long"), ("secretKey", "short")]
            .into_iter()
            .collect();
        let env: HashMap<String, String> = HashMap::new();
        let found = first_present(SECRET_KEY_CHAIN, Some(&query), &env);
        assert_eq!(found.map(|(_, v)| v), Some("short".to_string()));
    }

    #[test]
    fn test_map_with_custom_hasher_is_env_source() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::BuildHasherDefault;

        let mut env: HashMap<String, String, BuildHasherDefault<DefaultHasher>> =
            HashMap::default();
        env.insert("SECRET_KEY".to_string(), "generic".to_string());
        let found = first_present(SECRET_KEY_CHAIN, None, &env);
        assert_eq!(
            found,
            Some((Source::Env("SECRET_KEY"), "generic".to_string()))
        );
    }

    #[test]
    fn test_download_path_has_no_generic_fallback() {
        assert!(!DOWNLOAD_PATH_CHAIN.contains(&Source::Env("SECRET_KEY")));
        assert_eq!(DOWNLOAD_PATH_CHAIN.len(), 4);
        assert_eq!(SECRET_KEY_CHAIN.len(), 5);
    }

    #[test]
    fn test_source_display_names_source() {
        assert_eq!(
            Source::Env("SECRET_KEY").to_string(),
            "environment variable SECRET_KEY"
        );
    }
}
