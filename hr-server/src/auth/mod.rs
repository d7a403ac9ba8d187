//! Authentication
//!
//! - [`TokenCodec`] - signed, expiring session and data tokens
//! - [`SessionStore`] - username → live token, with PostgreSQL and in-memory backends
//! - [`AuthGate`] - application key + session middlewares
//! - [`CurrentUser`] - authenticated caller context

pub mod gate;
pub mod session;
pub mod token;

pub use gate::{
    APP_KEY_HEADER, AuthGate, CurrentUser, TOKEN_HEADER, require_app_key, require_session,
};
pub use session::{
    MemorySessionStore, PgSessionStore, SessionError, SessionManager, SessionStore,
};
pub use token::{
    ClientMeta, DataClaims, DataPayload, DataTokenCodec, SessionClaims, SessionTokenCodec,
    TokenCodec, TokenError,
};
