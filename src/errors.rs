use crate::{services::image_service::ActionError, storage::StorageError};
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<ActionError> for AppError {
    fn from(err: ActionError) -> Self {
        let status = match &err {
            ActionError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ActionError::MissingInput(_) | ActionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ActionError::Misconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ActionError::StorageFailure(_) => StatusCode::BAD_GATEWAY,
            ActionError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ActionError::NotFoundOrForbidden(_) => StatusCode::NOT_FOUND,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::new(err.status(), err.body_text())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::not_found(format!("object `{key}` not found")),
            StorageError::InvalidKey => AppError::not_found("object not found"),
            other => {
                tracing::error!("storage error: {}", other);
                AppError::internal("Failed to read object.")
            }
        }
    }
}
