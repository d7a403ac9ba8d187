//! Shared types for the HR administration backend
//!
//! Wire-level types used by the server and by any Rust client:
//! the JSON response envelope, the message-code table and the
//! handler-boundary error.

pub mod error;
pub mod message;
pub mod response;

// Re-exports
pub use error::{AppError, AppResult};
pub use http;
pub use message::{MessageKey, message_code};
pub use response::{DataResponse, ValidateErrors};
