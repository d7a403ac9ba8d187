//! Common infrastructure
//!
//! - Logging setup and the `audit_log!` / `security_log!` macros

pub mod logger;

pub use logger::{cleanup_old_logs, init_logger};
