//! Token codec
//!
//! Signs and verifies the two token flavors issued by the system:
//! - [`SessionClaims`]: user session token, only valid while it is also the
//!   value recorded in the session store for its username
//! - [`DataClaims`]: mobile data token, a self-contained capability with no
//!   session behind it
//!
//! Each flavor is its own codec type with its own secret, so a data token can
//! never be accepted where a session token is expected and vice versa.

use std::fmt;
use std::marker::PhantomData;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Token errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("bad token signature")]
    BadSignature,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Claims carried by a signed token
pub trait TokenClaims: Serialize + DeserializeOwned {
    /// Expiry (unix seconds)
    fn expires_at(&self) -> i64;
}

/// Client metadata captured when a session is opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub user_agent: String,
    pub ip_address: String,
}

impl ClientMeta {
    pub fn new(user_agent: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ip_address: ip_address.into(),
        }
    }
}

/// User session token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub username: String,
    #[serde(rename = "useragent")]
    pub user_agent: String,
    #[serde(rename = "ipaddress")]
    pub ip_address: String,
    /// Permission level, only present on tokens issued to the mobile app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<i64>,
    /// Issued at (unix seconds)
    #[serde(rename = "createdat")]
    pub issued_at: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Unique token id; two logins never mint the same token
    #[serde(default)]
    pub jti: String,
}

impl TokenClaims for SessionClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Mobile data token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataClaims {
    #[serde(rename = "employeeId")]
    pub employee_id: String,
    #[serde(rename = "dateInSeconds")]
    pub date_in_seconds: i64,
    /// "lat,lng"
    pub coordinates: String,
    #[serde(rename = "shiftId")]
    pub shift_id: i64,
    #[serde(rename = "createdat")]
    pub issued_at: i64,
    pub exp: i64,
}

impl TokenClaims for DataClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Content of a data token before it is stamped and signed
#[derive(Debug, Clone, PartialEq)]
pub struct DataPayload {
    pub employee_id: String,
    pub date_in_seconds: i64,
    pub coordinates: String,
    pub shift_id: i64,
}

/// HS256 codec for one claim type
pub struct TokenCodec<C> {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    _claims: PhantomData<fn() -> C>,
}

/// Codec for user session tokens
pub type SessionTokenCodec = TokenCodec<SessionClaims>;

/// Codec for mobile data tokens
pub type DataTokenCodec = TokenCodec<DataClaims>;

impl<C> Clone for TokenCodec<C> {
    fn clone(&self) -> Self {
        Self {
            encoding_key: self.encoding_key.clone(),
            decoding_key: self.decoding_key.clone(),
            ttl: self.ttl,
            _claims: PhantomData,
        }
    }
}

impl<C> fmt::Debug for TokenCodec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("claims", &std::any::type_name::<C>())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<C: TokenClaims> TokenCodec<C> {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            _claims: PhantomData,
        }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Verify signature and expiry, then decode the claims.
    ///
    /// Expiry is checked with zero leeway.
    pub fn verify(&self, token: &str) -> Result<C, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        decode::<C>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            })
    }

    fn sign(&self, claims: &C) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// (issued_at, expires_at) for a token minted now
    fn stamps(&self) -> (i64, i64) {
        let now = Utc::now();
        (now.timestamp(), (now + self.ttl).timestamp())
    }
}

impl TokenCodec<SessionClaims> {
    /// Issue a session token for a user
    pub fn issue(&self, username: &str, client: &ClientMeta) -> Result<String, TokenError> {
        self.issue_claims(username, client, None)
    }

    /// Issue a session token carrying a permission level (mobile login)
    pub fn issue_with_permission(
        &self,
        username: &str,
        client: &ClientMeta,
        permission: i64,
    ) -> Result<String, TokenError> {
        self.issue_claims(username, client, Some(permission))
    }

    fn issue_claims(
        &self,
        username: &str,
        client: &ClientMeta,
        permission: Option<i64>,
    ) -> Result<String, TokenError> {
        let (issued_at, exp) = self.stamps();
        self.sign(&SessionClaims {
            username: username.to_string(),
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_address.clone(),
            permission,
            issued_at,
            exp,
            jti: Uuid::new_v4().to_string(),
        })
    }
}

impl TokenCodec<DataClaims> {
    /// Issue a mobile data token
    pub fn issue(&self, payload: &DataPayload) -> Result<String, TokenError> {
        let (issued_at, exp) = self.stamps();
        self.sign(&DataClaims {
            employee_id: payload.employee_id.clone(),
            date_in_seconds: payload.date_in_seconds,
            coordinates: payload.coordinates.clone(),
            shift_id: payload.shift_id,
            issued_at,
            exp,
        })
    }
}
