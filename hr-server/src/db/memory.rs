//! In-memory entity store
//!
//! One lock guards all tables. A transaction holds the lock for its whole
//! lifetime and works on a staged copy that replaces the tables on commit, so
//! transactions are serialized and a dropped transaction leaves no trace.
//! Parent references are checked like a foreign key.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::record::{EntityFields, EntityRecord, EntityRow};
use super::resource::ResourceDef;
use super::{EntityStore, EntityTx, Scope, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct Tables {
    /// table → id → row
    rows: HashMap<&'static str, BTreeMap<i64, EntityRecord>>,
    /// table → last issued id
    sequences: HashMap<&'static str, i64>,
}

impl Tables {
    fn table(&self, def: &ResourceDef) -> Option<&BTreeMap<i64, EntityRecord>> {
        self.rows.get(def.table)
    }

    fn get(&self, def: &ResourceDef, id: i64) -> Option<&EntityRecord> {
        self.table(def).and_then(|t| t.get(&id))
    }

    fn with_parent(&self, def: &ResourceDef, record: &EntityRecord) -> EntityRow {
        let parent = def
            .parent
            .zip(record.parent_id)
            .and_then(|(parent_def, id)| self.get(parent_def, id))
            .filter(|p| p.is_active())
            .cloned();
        EntityRow {
            record: record.clone(),
            parent,
        }
    }

    fn check_parent(&self, def: &ResourceDef, parent_id: Option<i64>) -> StoreResult<()> {
        let Some(parent_def) = def.parent else {
            return Ok(());
        };
        match parent_id {
            Some(id) if self.get(parent_def, id).is_some() => Ok(()),
            _ => Err(StoreError::ForeignKey(format!(
                "{}.{} = {:?} has no row in {}",
                def.table, parent_def.id_column, parent_id, parent_def.table
            ))),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryEntityStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn list(&self, def: &'static ResourceDef, scope: Scope) -> StoreResult<Vec<EntityRow>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .table(def)
            .into_iter()
            .flat_map(|t| t.values())
            .filter(|r| scope.matches(r))
            .map(|r| tables.with_parent(def, r))
            .collect())
    }

    async fn find(
        &self,
        def: &'static ResourceDef,
        id: i64,
        scope: Scope,
    ) -> StoreResult<Option<EntityRow>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .get(def, id)
            .filter(|r| scope.matches(r))
            .map(|r| tables.with_parent(def, r)))
    }

    async fn begin(&self) -> StoreResult<Box<dyn EntityTx>> {
        let guard = self.inner.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryEntityTx { guard, staged }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryEntityTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl EntityTx for MemoryEntityTx {
    async fn find_for_update(
        &mut self,
        def: &'static ResourceDef,
        id: i64,
        scope: Scope,
    ) -> StoreResult<Option<EntityRecord>> {
        Ok(self
            .staged
            .get(def, id)
            .filter(|r| scope.matches(r))
            .cloned())
    }

    async fn exists(&mut self, def: &'static ResourceDef, id: i64) -> StoreResult<bool> {
        Ok(self.staged.get(def, id).is_some_and(|r| r.is_active()))
    }

    async fn insert(
        &mut self,
        def: &'static ResourceDef,
        fields: &EntityFields,
        actor: &str,
    ) -> StoreResult<EntityRecord> {
        self.staged.check_parent(def, fields.parent_id)?;

        let sequence = self.staged.sequences.entry(def.table).or_default();
        *sequence += 1;
        let now = Utc::now();
        let record = EntityRecord {
            id: *sequence,
            parent_id: fields.parent_id,
            names: fields.names.clone(),
            shortcut: fields.shortcut.clone(),
            log_version: 0,
            created_by: Some(actor.to_owned()),
            updated_by: None,
            deleted_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.staged
            .rows
            .entry(def.table)
            .or_default()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn save(&mut self, def: &'static ResourceDef, record: &EntityRecord) -> StoreResult<()> {
        self.staged.check_parent(def, record.parent_id)?;
        // UPDATE of a missing row touches nothing
        if let Some(row) = self
            .staged
            .rows
            .get_mut(def.table)
            .and_then(|t| t.get_mut(&record.id))
        {
            *row = EntityRecord {
                created_by: row.created_by.clone(),
                created_at: row.created_at,
                ..record.clone()
            };
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryEntityTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::resource::{DEPARTMENT, GROUP};

    fn fields(parent_id: Option<i64>, name: &str) -> EntityFields {
        EntityFields {
            parent_id,
            names: vec![name.into(), name.into(), name.into()],
            shortcut: String::new(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_rows() {
        let store = MemoryEntityStore::new();
        let mut tx = store.begin().await.unwrap();
        let dept = tx.insert(&DEPARTMENT, &fields(None, "HR"), "1105").await.unwrap();
        assert_eq!(dept.id, 1);
        assert_eq!(dept.log_version, 0);
        tx.commit().await.unwrap();

        let rows = store.list(&DEPARTMENT, Scope::Active).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.created_by.as_deref(), Some("1105"));
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_rows() {
        let store = MemoryEntityStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert(&DEPARTMENT, &fields(None, "HR"), "1105").await.unwrap();
        tx.rollback().await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(&DEPARTMENT, &fields(None, "IT"), "1105").await.unwrap();
        }

        assert!(store.list(&DEPARTMENT, Scope::Any).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_key_enforced() {
        let store = MemoryEntityStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.insert(&GROUP, &fields(Some(42), "G"), "1105").await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey(_)));
    }

    #[tokio::test]
    async fn test_parent_hidden_when_soft_deleted() {
        let store = MemoryEntityStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut dept = tx.insert(&DEPARTMENT, &fields(None, "HR"), "1105").await.unwrap();
        let group = tx.insert(&GROUP, &fields(Some(dept.id), "G"), "1105").await.unwrap();
        tx.commit().await.unwrap();

        let row = store.find(&GROUP, group.id, Scope::Active).await.unwrap().unwrap();
        assert_eq!(row.parent.map(|p| p.id), Some(dept.id));

        let mut tx = store.begin().await.unwrap();
        dept.deleted_at = Some(Utc::now());
        tx.save(&DEPARTMENT, &dept).await.unwrap();
        assert!(!tx.exists(&DEPARTMENT, dept.id).await.unwrap());
        tx.commit().await.unwrap();

        let row = store.find(&GROUP, group.id, Scope::Active).await.unwrap().unwrap();
        assert!(row.parent.is_none());
    }
}
