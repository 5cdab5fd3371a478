//! Error handling for the bookstore HTTP layer

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Message returned whenever a required book field is missing.
pub const MISSING_FIELDS_MESSAGE: &str = "Please fill in all the fields";

/// JSON body rendered for every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    /// Failure reported under a fixed operation message, with the cause in `error`.
    #[error("{message}: {source}")]
    Operation {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Wrap any unexpected failure; its text becomes the response message
    pub fn internal(error: impl Into<anyhow::Error>) -> Self {
        Self::Internal(error.into())
    }

    /// Wrap an unexpected failure under a fixed operation message
    pub fn operation(message: impl Into<String>, error: impl Into<anyhow::Error>) -> Self {
        Self::Operation {
            message: message.into(),
            source: error.into(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::BadRequest { .. } => "bad_request",
            AppError::NotFound { .. } => "not_found",
            AppError::Operation { .. } | AppError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Operation { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let status = self.status();
        let error_code = self.code();

        let body = match self {
            AppError::Validation { message }
            | AppError::BadRequest { message }
            | AppError::NotFound { message } => {
                tracing::error!(
                    error_id = %error_id,
                    error_code,
                    status_code = %status.as_u16(),
                    %message,
                    "Request error"
                );
                ErrorBody {
                    message,
                    error: None,
                }
            }
            AppError::Operation { message, source } => {
                tracing::error!(
                    error_id = %error_id,
                    error_code,
                    status_code = %status.as_u16(),
                    error = ?source,
                    "{}",
                    message
                );
                ErrorBody {
                    message,
                    error: Some(source.to_string()),
                }
            }
            AppError::Internal(source) => {
                tracing::error!(
                    error_id = %error_id,
                    error_code,
                    status_code = %status.as_u16(),
                    error = ?source,
                    "Unexpected error"
                );
                ErrorBody {
                    message: source.to_string(),
                    error: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}
