//! Bearer-token gate for the protocol endpoint.
//!
//! The gate is switched on at startup when `SMITHERY_CLIENT_ID` is set. Once
//! active it demands `Authorization: Bearer <token>` and hands the token to a
//! [`TokenVerifier`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::safe_prefix;
use crate::config::EnvSource;

/// Variable whose presence activates the gate.
pub const CLIENT_ID_VAR: &str = "SMITHERY_CLIENT_ID";

/// Comma-separated allow-list for [`StaticTokenVerifier`].
pub const AUTH_TOKENS_VAR: &str = "MCP_AUTH_TOKENS";

/// Why a request was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization` header.
    #[error("Unauthorized: Missing Authorization header")]
    MissingHeader,
    /// The header is not `Bearer <token>`.
    #[error("Unauthorized: Invalid Authorization header format")]
    InvalidFormat,
    /// `Bearer` with nothing after it.
    #[error("Unauthorized: Empty Bearer token")]
    EmptyToken,
    /// The verifier refused the token.
    #[error("Unauthorized: Invalid token")]
    TokenRejected,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
            self.to_string(),
        )
            .into_response()
    }
}

/// Decides whether a bearer token grants access.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns `true` if `token` is acceptable.
    async fn verify(&self, token: &str) -> bool;
}

/// Accepts every non-empty token without checking it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyToken;

#[async_trait]
impl TokenVerifier for AcceptAnyToken {
    async fn verify(&self, _token: &str) -> bool {
        true
    }
}

/// Accepts tokens from a fixed allow-list.
#[derive(Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashSet<String>,
}

impl StaticTokenVerifier {
    /// Creates a verifier accepting exactly `tokens`. Blank entries are
    /// ignored.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Parses a comma-separated token list.
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Returns the number of accepted tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no token is accepted.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Debug for StaticTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenVerifier")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
///
/// # Errors
///
/// Returns the matching [`AuthRejection`] for a missing or empty header, a
/// scheme other than `Bearer`, or an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthRejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthRejection::MissingHeader)?;
    let value = value.to_str().map_err(|_| AuthRejection::InvalidFormat)?;
    if value.is_empty() {
        return Err(AuthRejection::MissingHeader);
    }

    match value.split_once(' ') {
        Some(("Bearer", "")) => Err(AuthRejection::EmptyToken),
        Some(("Bearer", token)) => Ok(token),
        _ => Err(AuthRejection::InvalidFormat),
    }
}

/// Admission policy for the protocol endpoint.
#[derive(Clone, Default)]
pub struct AuthGate {
    verifier: Option<Arc<dyn TokenVerifier>>,
}

impl AuthGate {
    /// A gate that admits every request.
    pub fn disabled() -> Self {
        Self { verifier: None }
    }

    /// A gate that requires a bearer token accepted by `verifier`.
    pub fn enabled(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
        }
    }

    /// Builds the gate from the environment, read once at startup.
    ///
    /// Inactive unless `SMITHERY_CLIENT_ID` is non-empty. When active, tokens
    /// are checked against `MCP_AUTH_TOKENS` if set; otherwise any non-empty
    /// token is admitted.
    pub fn from_env(env: &dyn EnvSource) -> Self {
        if env.var(CLIENT_ID_VAR).is_none_or(|v| v.is_empty()) {
            debug!("OAuth not configured, authentication disabled");
            return Self::disabled();
        }

        let allow_list = env
            .var(AUTH_TOKENS_VAR)
            .map(|list| StaticTokenVerifier::from_list(&list))
            .filter(|v| !v.is_empty());

        if let Some(verifier) = allow_list {
            info!(tokens = verifier.len(), "Bearer authentication enabled with static tokens");
            return Self::enabled(Arc::new(verifier));
        }

        warn!(
            "Bearer authentication enabled without verification; set {AUTH_TOKENS_VAR} \
             to restrict accepted tokens"
        );
        Self::enabled(Arc::new(AcceptAnyToken))
    }

    /// Returns `true` if requests must carry a bearer token.
    pub fn is_active(&self) -> bool {
        self.verifier.is_some()
    }

    /// Decides whether a request with `headers` may proceed.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthRejection`] describing why the request was refused.
    pub async fn admit(&self, headers: &HeaderMap) -> Result<(), AuthRejection> {
        let Some(verifier) = &self.verifier else {
            return Ok(());
        };

        let token = bearer_token(headers).inspect_err(|reason| {
            warn!(reason = %reason, "Rejected request");
        })?;

        if verifier.verify(token).await {
            debug!(token_prefix = %safe_prefix(token), "Bearer token accepted");
            Ok(())
        } else {
            warn!(token_prefix = %safe_prefix(token), "Bearer token rejected");
            Err(AuthRejection::TokenRejected)
        }
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Middleware applying an [`AuthGate`] to the wrapped routes.
pub async fn require_bearer(
    State(gate): State<AuthGate>,
    request: Request,
    next: Next,
) -> Response {
    let decision = gate.admit(request.headers()).await;
    match decision {
        Ok(()) => next.run(request).await,
        Err(rejection) => rejection.into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn headers(authorization: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            let value = HeaderValue::from_str(value).unwrap_or_else(|e| panic!("header: {e}"));
            headers.insert(header::AUTHORIZATION, value);
        }
        headers
    }

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test_case(Some("Bearer xyz"), Ok("xyz") ; "bearer")]
    #[test_case(None, Err(AuthRejection::MissingHeader) ; "missing")]
    #[test_case(Some(""), Err(AuthRejection::MissingHeader) ; "empty header")]
    #[test_case(Some("Token xyz"), Err(AuthRejection::InvalidFormat) ; "other scheme")]
    #[test_case(Some("Bearer"), Err(AuthRejection::InvalidFormat) ; "no separator")]
    #[test_case(Some("bearer xyz"), Err(AuthRejection::InvalidFormat) ; "lowercase scheme")]
    #[test_case(Some("Bearer "), Err(AuthRejection::EmptyToken) ; "empty token")]
    fn test_bearer_token(value: Option<&str>, expected: Result<&str, AuthRejection>) {
        assert_eq!(bearer_token(&headers(value)), expected);
    }

    #[tokio::test]
    async fn test_inactive_gate_admits_everything() {
        let gate = AuthGate::from_env(&env(&[]));
        assert!(!gate.is_active());
        assert_eq!(gate.admit(&headers(None)).await, Ok(()));
        assert_eq!(gate.admit(&headers(Some("Token xyz"))).await, Ok(()));
    }

    #[tokio::test]
    async fn test_empty_client_id_keeps_gate_inactive() {
        let gate = AuthGate::from_env(&env(&[(CLIENT_ID_VAR, "")]));
        assert!(!gate.is_active());
    }

    #[tokio::test]
    async fn test_active_gate_without_allow_list() {
        let gate = AuthGate::from_env(&env(&[(CLIENT_ID_VAR, "client")]));
        assert!(gate.is_active());
        assert_eq!(gate.admit(&headers(Some("Bearer xyz"))).await, Ok(()));
        assert_eq!(
            gate.admit(&headers(Some("Token xyz"))).await,
            Err(AuthRejection::InvalidFormat)
        );
        assert_eq!(
            gate.admit(&headers(None)).await,
            Err(AuthRejection::MissingHeader)
        );
    }

    #[tokio::test]
    async fn test_active_gate_with_allow_list() {
        let gate = AuthGate::from_env(&env(&[
            (CLIENT_ID_VAR, "client"),
            (AUTH_TOKENS_VAR, "alpha, beta,,"),
        ]));
        assert_eq!(gate.admit(&headers(Some("Bearer beta"))).await, Ok(()));
        assert_eq!(
            gate.admit(&headers(Some("Bearer gamma"))).await,
            Err(AuthRejection::TokenRejected)
        );
    }

    #[test]
    fn test_static_verifier_ignores_blank_entries() {
        let verifier = StaticTokenVerifier::from_list(" a ,, b ,");
        assert_eq!(verifier.len(), 2);
        assert!(StaticTokenVerifier::from_list(" , ").is_empty());
    }

    #[test]
    fn test_rejection_response() {
        let response = AuthRejection::EmptyToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
