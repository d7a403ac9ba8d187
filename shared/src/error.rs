//! Handler-boundary error
//!
//! [`AppError`] is what every handler returns on failure. It always renders
//! as an HTTP 200 envelope with `status: false`; clients branch on the
//! message code, not on the HTTP status.

use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

use crate::message::MessageKey;
use crate::response::{DataResponse, ValidateErrors};

/// Application error rendered as a failed envelope
#[derive(Debug, Clone, Error)]
#[error("{key}")]
pub struct AppError {
    /// Symbolic message key
    pub key: MessageKey,
    /// Field-level validation failures, if any
    pub validate_error: Option<ValidateErrors>,
}

impl AppError {
    pub fn new(key: MessageKey) -> Self {
        Self {
            key,
            validate_error: None,
        }
    }

    /// Validation failure carrying a field → message map
    pub fn missing_fields(errors: ValidateErrors) -> Self {
        Self {
            key: MessageKey::MissingFields,
            validate_error: Some(errors),
        }
    }

    pub fn key_not_found() -> Self {
        Self::new(MessageKey::KeyNotFound)
    }

    pub fn token_incorrect() -> Self {
        Self::new(MessageKey::TokenIncorrect)
    }

    pub fn system_error() -> Self {
        Self::new(MessageKey::SystemError)
    }
}

impl From<MessageKey> for AppError {
    fn from(key: MessageKey) -> Self {
        Self::new(key)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        DataResponse::<Value>::failure(self.key, self.validate_error).into_response()
    }
}

/// Result type for handlers
pub type AppResult<T> = Result<T, AppError>;
