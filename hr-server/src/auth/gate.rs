//! Authentication gate
//!
//! Two chained middlewares, each answering with a failed envelope instead of
//! passing the request on:
//!
//! 1. [`require_app_key`]: `x-csv-key` must equal the configured application key
//! 2. [`require_session`]: `x-csv-token: <scheme> <token>` must carry a valid,
//!    unexpired session token that is also the live session of its username
//!
//! On success [`CurrentUser`] is inserted into the request extensions.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use shared::AppError;
use subtle::ConstantTimeEq;

use super::session::SessionStore;
use super::token::{SessionClaims, SessionTokenCodec};
use crate::security_log;

/// Application key header
pub const APP_KEY_HEADER: &str = "x-csv-key";
/// Session token header (`<scheme> <token>`)
pub const TOKEN_HEADER: &str = "x-csv-token";

/// Authenticated caller, taken from the session token claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub username: String,
    pub user_agent: String,
    pub ip_address: String,
    pub permission: Option<i64>,
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            username: claims.username,
            user_agent: claims.user_agent,
            ip_address: claims.ip_address,
            permission: claims.permission,
        }
    }
}

/// Reads the [`CurrentUser`] placed by [`require_session`]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(AppError::token_incorrect)
    }
}

#[derive(Clone)]
pub struct AuthGate {
    app_key: Arc<str>,
    codec: SessionTokenCodec,
    sessions: Arc<dyn SessionStore>,
}

impl AuthGate {
    pub fn new(
        app_key: impl Into<Arc<str>>,
        codec: SessionTokenCodec,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            codec,
            sessions,
        }
    }

    /// Application-key check
    pub fn check_app_key(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let presented = headers
            .get(APP_KEY_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();

        if presented.is_empty() || !secure_eq(presented, self.app_key.as_bytes()) {
            security_log!(WARN, "app_key_rejected", present = !presented.is_empty());
            return Err(AppError::key_not_found());
        }
        Ok(())
    }

    /// Session check: token signature/expiry, then the live-session cross-check
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<CurrentUser, AppError> {
        let Some(token) = bearer_token(headers) else {
            security_log!(WARN, "token_missing", header = TOKEN_HEADER);
            return Err(AppError::token_incorrect());
        };

        let claims = self.codec.verify(token).map_err(|e| {
            security_log!(WARN, "token_rejected", error = %e);
            AppError::token_incorrect()
        })?;

        let live = self.sessions.get(&claims.username).await.map_err(|e| {
            tracing::error!(error = %e, username = %claims.username, "Session lookup failed");
            AppError::token_incorrect()
        })?;

        match live {
            Some(stored) if secure_eq(stored.as_bytes(), token.as_bytes()) => {
                Ok(CurrentUser::from(claims))
            }
            Some(_) => {
                security_log!(WARN, "session_mismatch", username = %claims.username);
                Err(AppError::token_incorrect())
            }
            None => {
                security_log!(WARN, "session_missing", username = %claims.username);
                Err(AppError::token_incorrect())
            }
        }
    }
}

/// Constant-time byte comparison; length mismatch is unequal
fn secure_eq(presented: &[u8], expected: &[u8]) -> bool {
    presented.ct_eq(expected).into()
}

/// Second whitespace-separated part of the token header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(TOKEN_HEADER)?
        .to_str()
        .ok()?
        .split_whitespace()
        .nth(1)
}

/// Rejects requests without the application key
pub async fn require_app_key(
    State(gate): State<AuthGate>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate.check_app_key(req.headers())?;
    Ok(next.run(req).await)
}

/// Rejects requests without a live session token
pub async fn require_session(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = gate.authenticate(req.headers()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
