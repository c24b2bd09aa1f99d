use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RequestError;

/// Request-level errors.
///
/// Failures inside a dialect pipeline never become an `AppError`; they are
/// reported in that dialect's outcome instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::MissingQuestion | RequestError::MissingCredential => {
                AppError::Configuration(err.to_string())
            }
            RequestError::EmptySchema(_) => AppError::Validation(err.to_string()),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
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
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match self {
            AppError::Configuration(msg) => {
                let detail = if msg.contains("API key") {
                    ErrorDetail::new("CONFIGURATION_ERROR", msg)
                        .with_details("Set LLM_API_KEY (or GROQ_API_KEY) or send api_key with the request.")
                } else {
                    ErrorDetail::new("CONFIGURATION_ERROR", msg)
                };
                (StatusCode::BAD_REQUEST, detail)
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_detail,
        });

        (status, body).into_response()
    }
}
