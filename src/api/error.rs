//! API error types with structured JSON responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Note not ready: {0}")]
    NoteNotReady(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, retryable) = match &self {
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
                false,
            ),
            ApiError::InvalidState(detail) => (
                StatusCode::CONFLICT,
                "INVALID_STATE",
                detail.clone(),
                false,
            ),
            ApiError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                detail.clone(),
                false,
            ),
            ApiError::NoteNotReady(detail) => (
                StatusCode::NOT_FOUND,
                "NOTE_NOT_READY",
                detail.clone(),
                false,
            ),
            ApiError::Unavailable(detail) => {
                tracing::warn!(detail, "Capability unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CAPABILITY_UNAVAILABLE",
                    "A model backend is unavailable, try again later".to_string(),
                    true,
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    false,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                retryable,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidState(m) => ApiError::InvalidState(m),
            CoreError::InvalidInput(m) => ApiError::BadRequest(m),
            CoreError::NotFound(m) => ApiError::NotFound(m),
            CoreError::CapabilityUnavailable(m) => ApiError::Unavailable(m),
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Internal(m) => ApiError::Internal(m),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Parse a UUID from a path segment or body field.
pub fn parse_id(field: &str, raw: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid {field} format")))
}
