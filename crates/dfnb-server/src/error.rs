//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all API endpoints. It implements
//! `axum::response::IntoResponse` to produce structured JSON error responses
//! with appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use dfnb_core::CoreError;
use dfnb_state::StateError;

use crate::execution::ExecutionError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details (e.g., a backend traceback).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource conflict (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend reported an execution error (422).
    #[error("execution failed: {ename}: {evalue}")]
    ExecutionFailed {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },

    /// The execution was dropped after an earlier failure (409).
    #[error("execution aborted")]
    Aborted,

    /// The backend could not be reached or went away (502).
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::ExecutionFailed { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "EXECUTION_FAILED")
            }
            ApiError::Aborted => (StatusCode::CONFLICT, "ABORTED"),
            ApiError::BackendUnavailable(_) => (StatusCode::BAD_GATEWAY, "BACKEND_UNAVAILABLE"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let details = match &self {
            ApiError::ExecutionFailed {
                ename,
                evalue,
                traceback,
            } => Some(serde_json::json!({
                "ename": ename,
                "evalue": evalue,
                "traceback": traceback,
            })),
            _ => None,
        };
        let detail = ApiErrorDetail {
            code: code.to_string(),
            message: self.to_string(),
            details,
        };

        let body = serde_json::json!({
            "success": false,
            "error": detail,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::CellNotFound { .. } => ApiError::NotFound(err.to_string()),
            CoreError::IdentifierCollision { .. } => ApiError::Conflict(err.to_string()),
            CoreError::InvalidIdentifier { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match &err {
            StateError::GraphNotFound(_) | StateError::SessionNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
        }
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Backend {
                ename,
                evalue,
                traceback,
            } => ApiError::ExecutionFailed {
                ename,
                evalue,
                traceback,
            },
            ExecutionError::Aborted => ApiError::Aborted,
            ExecutionError::Transport(_) | ExecutionError::Disconnected => {
                ApiError::BackendUnavailable(err.to_string())
            }
            ExecutionError::Core(core) => core.into(),
            ExecutionError::UnknownCell(_) => ApiError::NotFound(err.to_string()),
        }
    }
}
