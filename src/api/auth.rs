use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use crate::core::error::AuthError;

pub const DEFAULT_BEARER_TOKEN: &str = "MY_SECRET_TOKEN";

/// Whether the greeting route requires a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    Open,
    Bearer(String),
}

impl AuthPolicy {
    pub fn bearer(token: impl Into<String>) -> Self {
        AuthPolicy::Bearer(token.into())
    }
}

/// Validate an `Authorization` header against the expected secret.
pub fn check_bearer(value: Option<&HeaderValue>, expected: &str) -> Result<(), AuthError> {
    let value = value.ok_or(AuthError::Missing)?;
    let raw = value.to_str().map_err(|_| AuthError::Malformed)?;
    let (scheme, credentials) = raw.split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") || credentials.is_empty() {
        return Err(AuthError::Malformed);
    }
    if credentials != expected {
        return Err(AuthError::InvalidToken);
    }
    Ok(())
}

pub async fn require_bearer(
    State(expected): State<Arc<str>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Err(e) = check_bearer(req.headers().get(header::AUTHORIZATION), &expected) {
        tracing::debug!(path = %req.uri().path(), error = %e, "bearer check rejected request");
        return Err(e);
    }
    Ok(next.run(req).await)
}
