//! Error types for the weathercast service.
//!
//! Each layer has its own error: storage failures are [`StoreError`], forecast
//! model failures are [`crate::engine::EngineError`], and anything that reaches
//! an HTTP handler is an [`AppError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

// ---

/// Failure of a storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let (status, code) = self.status_and_code();

        // Server-side details stay in the log
        let message = if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
            "An internal server error occurred".to_string()
        } else {
            tracing::debug!("Request rejected: {}", self);
            self.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}

/// Result type alias for handlers and services.
pub type AppResult<T> = Result<T, AppError>;
