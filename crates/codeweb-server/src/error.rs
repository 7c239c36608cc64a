//! HTTP error type for request handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use codeweb_common::CodewebError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Handler result type
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced to HTTP clients
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] CodewebError),
}

impl AppError {
    /// Failed login. Logged with the handler that rejected it.
    pub fn invalid_credentials(handler: &'static str, detail: &str) -> Self {
        error!(handler, detail, "invalid credentials");
        AppError::InvalidCredentials
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Store(e) if e.is_conversion() => StatusCode::BAD_REQUEST,
            AppError::Store(e) if e.is_connection() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = if status.is_server_error() {
            error!(error = %self, "request failed");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Database unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
