use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::domain::ErrorBody;

/// Failures of the bearer-token guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    Missing,
    #[error("Invalid authentication credentials")]
    Malformed,
    #[error("Invalid or expired token")]
    InvalidToken,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Missing | AuthError::Malformed => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Errors raised while turning a tool call into a REST request.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("missing required field: {0}")]
    MissingParam(String),
    #[error("failed to build request: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<BridgeError> for rmcp::ErrorData {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::UnknownTool(_) | BridgeError::MissingParam(_) => {
                rmcp::ErrorData::invalid_params(e.to_string(), None)
            }
            BridgeError::Request(_) | BridgeError::Body(_) => {
                rmcp::ErrorData::internal_error(e.to_string(), None)
            }
        }
    }
}
