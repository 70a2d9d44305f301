//! HTTP-facing error type. Wraps [`ax_domain::error::Error`] and anything
//! else a handler can fail with, and renders the "user-visible behavior
//! strings" callers depend on (`"Message blocked: <reason>"`,
//! `"Agent processing failed: <diagnosis>"`, etc).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use ax_domain::error::Error as DomainError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("message blocked: {0}")]
    Blocked(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(DomainError::SessionId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Domain(DomainError::TaintExceeded(_)) => StatusCode::FORBIDDEN,
            ApiError::Domain(DomainError::ScanBlocked(_)) => StatusCode::FORBIDDEN,
            ApiError::Domain(DomainError::Auth(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Domain(DomainError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Domain(DomainError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Blocked(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the error message the way an end user would see it, per the
    /// fixed behavior strings callers match on.
    fn public_message(&self) -> String {
        match self {
            ApiError::Blocked(reason) => format!("Message blocked: {reason}"),
            ApiError::Domain(DomainError::ScanBlocked(reason)) => {
                format!("Message blocked: {reason}")
            }
            ApiError::Domain(DomainError::TaintExceeded(reason)) => {
                format!("Message blocked: taint budget exceeded ({reason})")
            }
            ApiError::Domain(DomainError::Sandbox(diagnosis)) => {
                format!("Agent processing failed: {diagnosis}")
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}
