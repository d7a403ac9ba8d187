//! Session store
//!
//! Maps a username to the one token currently live for it. A session token is
//! only accepted when it is byte-for-byte the value recorded here, so opening a
//! new session silently retires the previous token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::token::{ClientMeta, SessionTokenCodec, TokenError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored session is not valid UTF-8")]
    Decode,

    #[error("token error: {0}")]
    Token(#[from] TokenError),
}

/// Expiring key-value store of active sessions
///
/// TTL enforcement belongs to the backend: `get` never returns an expired value.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current token for `identity`, if any
    async fn get(&self, identity: &str) -> Result<Option<String>, SessionError>;

    /// Record `token` as the live session. A zero `ttl` never expires.
    async fn set(&self, identity: &str, token: &str, ttl: Duration) -> Result<(), SessionError>;

    async fn delete(&self, identity: &str) -> Result<(), SessionError>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// Sessions in the `session` table (`k` username, `v` token, `e` unix expiry, 0 = none)
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete expired rows, returning how many were removed
    pub async fn gc(&self) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM session WHERE e <> 0 AND e <= $1")
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Sweep expired sessions on a fixed interval
    pub fn spawn_gc(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match self.gc().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(removed = n, "Expired sessions removed"),
                    Err(e) => tracing::error!(error = %e, "Session gc failed"),
                }
            }
        })
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, identity: &str) -> Result<Option<String>, SessionError> {
        let value: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT v FROM session WHERE k = $1 AND (e = 0 OR e > $2)")
                .bind(identity)
                .bind(chrono::Utc::now().timestamp())
                .fetch_optional(&self.pool)
                .await?;

        value
            .map(|bytes| String::from_utf8(bytes).map_err(|_| SessionError::Decode))
            .transpose()
    }

    async fn set(&self, identity: &str, token: &str, ttl: Duration) -> Result<(), SessionError> {
        let expires_at = if ttl.is_zero() {
            0
        } else {
            chrono::Utc::now().timestamp() + ttl.as_secs() as i64
        };

        sqlx::query(
            "INSERT INTO session (k, v, e) VALUES ($1, $2, $3) \
             ON CONFLICT (k) DO UPDATE SET v = EXCLUDED.v, e = EXCLUDED.e",
        )
        .bind(identity)
        .bind(token.as_bytes())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM session WHERE k = $1")
            .bind(identity)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

struct Entry {
    token: String,
    deadline: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline.is_none_or(|d| now < d)
    }
}

/// In-process session store for tests and local runs.
///
/// Expired entries are swept on every write, so the map stays bounded by the
/// number of live sessions plus whatever expired since the last login.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drop expired entries, returning how many went
fn sweep(map: &mut HashMap<String, Entry>, now: Instant) -> usize {
    let before = map.len();
    map.retain(|_, entry| entry.is_live(now));
    before - map.len()
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, identity: &str) -> Result<Option<String>, SessionError> {
        let map = self.inner.lock().await;
        Ok(map
            .get(identity)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.token.clone()))
    }

    async fn set(&self, identity: &str, token: &str, ttl: Duration) -> Result<(), SessionError> {
        let now = Instant::now();
        let deadline = (!ttl.is_zero()).then(|| now + ttl);

        let mut map = self.inner.lock().await;
        let swept = sweep(&mut map, now);
        if swept > 0 {
            tracing::debug!(swept, "Expired in-memory sessions removed");
        }
        map.insert(
            identity.to_owned(),
            Entry {
                token: token.to_owned(),
                deadline,
            },
        );
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<(), SessionError> {
        self.inner.lock().await.remove(identity);
        Ok(())
    }
}

// ============================================================================
// Session manager
// ============================================================================

/// Opens and closes sessions: issues the token and records it as the live one
#[derive(Clone)]
pub struct SessionManager {
    codec: SessionTokenCodec,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(codec: SessionTokenCodec, store: Arc<dyn SessionStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &SessionTokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Issue a token for `username` and make it the live session.
    ///
    /// Any previous token for the same username stops being accepted.
    pub async fn open(&self, username: &str, client: &ClientMeta) -> Result<String, SessionError> {
        let token = self.codec.issue(username, client)?;
        self.store.set(username, &token, self.store_ttl()).await?;
        Ok(token)
    }

    /// End the live session of `username`
    pub async fn close(&self, username: &str) -> Result<(), SessionError> {
        self.store.delete(username).await
    }

    /// Session rows live exactly as long as the token they hold
    fn store_ttl(&self) -> Duration {
        self.codec.ttl().to_std().unwrap_or(Duration::ZERO)
    }
}
