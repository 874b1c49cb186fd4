/*
 * Responsibility
 * - HTTP-facing error type for the resource server
 * - IntoResponse (status + JSON error body)
 * - Map validator failures onto it
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::ValidationError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("token validation unavailable")]
    ValidationUnavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::ValidationUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "VALIDATION_UNAVAILABLE")
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        match e {
            // Validity is unknown, which is not the same as invalid.
            ValidationError::Transport(_) => AppError::ValidationUnavailable,
        }
    }
}
