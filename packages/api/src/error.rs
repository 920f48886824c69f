//! Request-boundary errors and their HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Errors returned by [`crate::JobService`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was malformed.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// The actor system is not accepting work.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Store or log I/O failed.
    #[error("Internal error: {0}")]
    Transient(String),
}

impl ApiError {
    pub fn missing_data() -> Self {
        ApiError::Validation("Job data is required".to_string())
    }

    pub fn job_not_found() -> Self {
        ApiError::NotFound("Job not found".to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::job_not_found(),
            other => ApiError::Transient(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, ErrorResponse::new(message)),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, ErrorResponse::new(message)),
            ApiError::Unavailable(reason) => {
                tracing::warn!("Request rejected: {}", reason);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("Service unavailable"),
                )
            }
            ApiError::Transient(reason) => {
                tracing::error!("Request failed: {}", reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
