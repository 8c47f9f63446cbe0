use crate::response::ApiResponse;
use crate::storage::StorageError;
use anyhow::anyhow;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use deadpool_diesel::InteractError;
use deadpool_diesel::postgres::PoolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// A single rejected form field, addressed by its path in the submitted form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String), // 400

    #[error("Unauthorized: {0}")]
    Unauthorized(String), // 401

    #[error("Forbidden: {0}")]
    Forbidden(String), // 403

    #[error("Not Found: {0}")]
    NotFound(String), // 404

    #[error("Conflict: {0}")]
    Conflict(String), // 409

    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>), // 422

    #[error("Upload failed: {0}")]
    UploadFailed(String), // 502

    #[error("Database pool error: {0}")]
    PoolError(#[from] PoolError), // 500

    #[error("Database interaction error: {0}")]
    InteractError(#[from] InteractError), // 500

    #[error("Database query error: {0}")]
    DieselError(#[from] diesel::result::Error), // 500 unless mapped by the caller

    #[error("Internal Server Error: {0}")]
    Internal(#[from] anyhow::Error), // 500
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        error!("Object storage error encountered: {:?}", err);
        AppError::UploadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(anyhow!("JSON encoding error: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, fields) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
            AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message, None),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, message, None),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message, None),
            AppError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed".to_string(),
                Some(fields),
            ),
            AppError::UploadFailed(message) => (StatusCode::BAD_GATEWAY, message, None),

            AppError::DieselError(diesel::result::Error::NotFound) => (
                StatusCode::NOT_FOUND,
                "Resource not found (database query)".to_string(),
                None,
            ),
            internal @ (AppError::PoolError(_)
            | AppError::InteractError(_)
            | AppError::DieselError(_)
            | AppError::Internal(_)) => {
                error!(
                    "Responding with 500 Internal Server Error. Source: {:?}",
                    internal
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ApiResponse::<Vec<FieldError>> {
            status_code: status.as_u16(),
            status_message: error_message,
            data: fields,
        };

        (status, body).into_response()
    }
}
