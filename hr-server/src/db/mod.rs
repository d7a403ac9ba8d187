//! Persistence
//!
//! [`EntityStore`] reads rows and opens transactions; every write goes through
//! an [`EntityTx`] so a whole batch commits or rolls back together.
//!
//! - [`postgres`] - sqlx / PostgreSQL
//! - [`memory`] - in-process tables for tests and local runs

pub mod memory;
pub mod postgres;
pub mod record;
pub mod resource;

pub use memory::MemoryEntityStore;
pub use postgres::PgEntityStore;
pub use record::{EntityFields, EntityRecord, EntityRow, PayloadError, UpdateEntity, parse_batch};
pub use resource::{DEPARTMENT, GROUP, RESOURCES, ResourceDef, SHIFT, TEAM};

use async_trait::async_trait;
use thiserror::Error;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error("row decode error: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::ForeignKey(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                StoreError::Decode(err.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Soft-delete filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `deleted_at IS NULL`
    Active,
    /// `deleted_at IS NOT NULL`
    Deleted,
    /// No filter
    Any,
}

impl Scope {
    pub fn matches(self, record: &EntityRecord) -> bool {
        match self {
            Scope::Active => record.is_active(),
            Scope::Deleted => !record.is_active(),
            Scope::Any => true,
        }
    }
}

/// Read side and transaction factory
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Rows in `scope` with their parent, ordered by id
    async fn list(&self, def: &'static ResourceDef, scope: Scope) -> StoreResult<Vec<EntityRow>>;

    async fn find(
        &self,
        def: &'static ResourceDef,
        id: i64,
        scope: Scope,
    ) -> StoreResult<Option<EntityRow>>;

    async fn begin(&self) -> StoreResult<Box<dyn EntityTx>>;

    /// Liveness probe
    async fn ping(&self) -> StoreResult<()>;
}

/// Write side, one open transaction
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait EntityTx: Send {
    /// Load and lock one row
    async fn find_for_update(
        &mut self,
        def: &'static ResourceDef,
        id: i64,
        scope: Scope,
    ) -> StoreResult<Option<EntityRecord>>;

    /// Whether an active row with `id` exists
    async fn exists(&mut self, def: &'static ResourceDef, id: i64) -> StoreResult<bool>;

    /// Insert a fresh row (version 0) created by `actor`
    async fn insert(
        &mut self,
        def: &'static ResourceDef,
        fields: &EntityFields,
        actor: &str,
    ) -> StoreResult<EntityRecord>;

    /// Write back every column of an existing row
    async fn save(&mut self, def: &'static ResourceDef, record: &EntityRecord) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
