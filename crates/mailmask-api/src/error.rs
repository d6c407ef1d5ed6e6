//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mailmask_core::MailmaskError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Masking(String),
    Classification(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::Masking(msg) => {
                tracing::error!(error = %msg, "Masking failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("MASKING_ERROR", "Failed to mask email").with_details(msg),
                )
            }
            AppError::Classification(msg) => {
                tracing::warn!(error = %msg, "Classification failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError::new("CLASSIFICATION_ERROR", "Failed to classify email")
                        .with_details(msg),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::internal_error().with_details(msg),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MailmaskError> for AppError {
    fn from(err: MailmaskError) -> Self {
        match err {
            MailmaskError::InvalidInput(msg) => AppError::BadRequest(msg),
            MailmaskError::Masking(msg) => AppError::Masking(msg),
            MailmaskError::Classification(msg) => AppError::Classification(msg),
            MailmaskError::Config(msg) => {
                AppError::Internal(format!("Configuration error: {msg}"))
            }
            MailmaskError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}
