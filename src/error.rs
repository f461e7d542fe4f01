//! Application error types and their HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{gate::RENTER_HOME, listing_status::InvalidStatus, storage::StorageError};

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Body of every JSON error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// No valid session token on a request that needs one.
    #[error("authentication required")]
    AuthenticationMissing,

    /// Valid session whose role may not perform the operation.
    #[error("role not permitted for this operation")]
    AuthorizationMismatch,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("image host error: {0}")]
    ImageHost(#[from] StorageError),
}

impl From<InvalidStatus> for AppError {
    fn from(e: InvalidStatus) -> Self {
        AppError::Validation(e.to_string())
    }
}

fn json_error(status: StatusCode, error: &str, message: &str) -> Response {
    let body = Json(ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
    });
    (status, body).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::AuthenticationMissing => json_error(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Sign in to continue",
            ),
            // Role mismatches never reveal whether the resource exists.
            AppError::AuthorizationMismatch => Redirect::temporary(RENTER_HOME).into_response(),
            AppError::Validation(m) => json_error(StatusCode::BAD_REQUEST, "validation_error", m),
            AppError::NotFound(m) => json_error(StatusCode::NOT_FOUND, "not_found", m),
            AppError::Conflict(m) => json_error(StatusCode::CONFLICT, "conflict", m),
            AppError::Storage(e) => {
                tracing::error!(error = ?e, "row store operation failed");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "The operation could not be completed",
                )
            }
            AppError::ImageHost(e) => {
                tracing::error!(error = %e, "image host operation failed");
                json_error(
                    StatusCode::BAD_GATEWAY,
                    "image_host_error",
                    "Image upload or delete failed",
                )
            }
        }
    }
}
