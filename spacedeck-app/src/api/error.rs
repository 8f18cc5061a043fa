//! Error handling for the HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use spacedeck_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Core(e) => match e {
                CoreError::InvalidGrade(_) => (StatusCode::BAD_REQUEST, "invalid_grade"),
                CoreError::Invalid(_) => (StatusCode::BAD_REQUEST, "bad_request"),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                CoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                CoreError::InvariantViolation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation")
                }
                CoreError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            },
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
