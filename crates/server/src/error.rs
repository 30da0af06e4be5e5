// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hostwarden_core::{JobId, RegistryError};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes.
///
/// Note the split the gateway guarantees: a job that *failed* is not an
/// error — it is delivered as a normal terminal snapshot. These variants
/// cover only transport- and auth-level failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no credential presented")]
    Unauthorized,

    #[error("invalid credential")]
    Forbidden,

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("invalid job transition: {0}")]
    InvalidTransition(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::JobNotFound(id) => ApiError::JobNotFound(id),
            RegistryError::InvalidTransition { .. } | RegistryError::ProgressRegression { .. } => {
                ApiError::InvalidTransition(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Unauthorized => {
                tracing::warn!("Request without credentials to protected path");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new("Authentication required"),
                )
            }
            ApiError::Forbidden => {
                tracing::warn!("Request with invalid or revoked credentials");
                (StatusCode::FORBIDDEN, ErrorResponse::new("Invalid credentials"))
            }
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {id}")),
                )
            }
            ApiError::InvalidTransition(msg) => {
                tracing::warn!(message = %msg, "Invalid job transition");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Invalid job transition", msg.clone()),
                )
            }
            ApiError::UpstreamUnavailable(msg) => {
                tracing::error!(message = %msg, "Upstream unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::with_details("Upstream unavailable", msg.clone()),
                )
            }
            ApiError::UpstreamTimeout(msg) => {
                tracing::error!(message = %msg, "Upstream timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    ErrorResponse::with_details("Upstream timed out", msg.clone()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
