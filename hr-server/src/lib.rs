//! HR administration backend
//!
//! CRUD over departments, groups, teams and shifts with soft delete, a
//! per-row version counter and all-or-nothing batches, behind an
//! application-key + session-token gate.

pub mod api;
pub mod auth;
pub mod common;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod state;

pub use api::build_app;
pub use config::Config;
pub use state::AppState;
