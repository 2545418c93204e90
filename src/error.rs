use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::shipment::ShipmentStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("revert from {from} to {to} is not supported")]
    UnsupportedRevert {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    #[error("the initial status cannot be reverted")]
    InvalidRevert,

    #[error("verification code expired or missing")]
    CodeExpired,

    #[error("verification code does not match")]
    CodeMismatch,

    #[error("shipment {0} has no recipient phone number")]
    MissingContact(String),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidStatus(_) => "InvalidStatus",
            AppError::UnsupportedRevert { .. } => "UnsupportedRevert",
            AppError::InvalidRevert => "InvalidRevert",
            AppError::CodeExpired => "CodeExpired",
            AppError::CodeMismatch => "CodeMismatch",
            AppError::MissingContact(_) => "MissingContact",
            AppError::DuplicateEmail(_) => "DuplicateEmail",
            AppError::ValidationFailed(_) => "ValidationFailed",
            AppError::Internal(_) => "Internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStatus(_)
            | AppError::UnsupportedRevert { .. }
            | AppError::InvalidRevert
            | AppError::DuplicateEmail(_) => StatusCode::CONFLICT,
            AppError::CodeExpired => StatusCode::GONE,
            AppError::CodeMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::MissingContact(_) | AppError::ValidationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (self.status_code(), body).into_response()
    }
}
