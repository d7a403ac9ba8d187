//! API Response types
//!
//! Every endpoint answers with the same JSON envelope:
//! ```json
//! {
//!     "status": true,
//!     "message": "MSG_RI0001",
//!     "data": [ ... ],
//!     "validateError": { "team_name_vn": "MSG_V0001" }
//! }
//! ```
//! `validateError` is omitted unless a validation failure produced it.

use std::collections::BTreeMap;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::MessageKey;

/// Field name → message code
pub type ValidateErrors = BTreeMap<String, String>;

/// Unified response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T = Value> {
    pub status: bool,
    /// Message code (see [`crate::message_code`])
    pub message: String,
    /// Payload, `null` when the operation returns nothing
    #[serde(default)]
    pub data: Option<T>,
    #[serde(
        rename = "validateError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub validate_error: Option<ValidateErrors>,
}

impl<T> DataResponse<T> {
    /// Successful response carrying data
    pub fn success(key: MessageKey, data: T) -> Self {
        Self {
            status: true,
            message: key.code(),
            data: Some(data),
            validate_error: None,
        }
    }

    /// Successful response without data
    pub fn done(key: MessageKey) -> Self {
        Self {
            status: true,
            message: key.code(),
            data: None,
            validate_error: None,
        }
    }

    /// Failed response
    pub fn failure(key: MessageKey, validate_error: Option<ValidateErrors>) -> Self {
        Self {
            status: false,
            message: key.code(),
            data: None,
            validate_error,
        }
    }
}

impl<T: Serialize> IntoResponse for DataResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
