//! Entity lifecycle
//!
//! One generic create / list / get / update / soft-delete / restore workflow,
//! instantiated per [`ResourceDef`].
//!
//! ```text
//! Active --delete--> SoftDeleted --restore--> Active
//! Active --update--> Active (log_version + 1)
//! ```
//!
//! Batches are validated up front, then applied inside one transaction:
//! the first failing item rolls back every item of the batch.

pub mod hooks;
pub mod validate;

pub use hooks::{HookContext, LifecycleHooks, StandardHooks};

use std::sync::Arc;

use chrono::Utc;
use shared::ValidateErrors;
use thiserror::Error;

use crate::db::{
    EntityFields, EntityRecord, EntityRow, EntityStore, EntityTx, PayloadError, ResourceDef,
    Scope, StoreError, UpdateEntity,
};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("missing required fields: {0:?}")]
    Validation(ValidateErrors),

    #[error("record not found")]
    NotFound,

    #[error("referential check failed: {0}")]
    Referential(String),

    #[error("version conflict: expected {expected}, stored {stored}")]
    VersionConflict { expected: i64, stored: i64 },

    #[error("hook failed: {0}")]
    Hook(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Lifecycle of one resource type
#[derive(Clone)]
pub struct EntityLifecycle {
    def: &'static ResourceDef,
    store: Arc<dyn EntityStore>,
    hooks: Arc<dyn LifecycleHooks>,
}

impl EntityLifecycle {
    pub fn new(
        def: &'static ResourceDef,
        store: Arc<dyn EntityStore>,
        hooks: Arc<dyn LifecycleHooks>,
    ) -> Self {
        Self { def, store, hooks }
    }

    pub fn def(&self) -> &'static ResourceDef {
        self.def
    }

    /// Active (`deleted = false`) or soft-deleted rows, ordered by id
    pub async fn list(&self, deleted: bool) -> LifecycleResult<Vec<EntityRow>> {
        let scope = if deleted { Scope::Deleted } else { Scope::Active };
        Ok(self.store.list(self.def, scope).await?)
    }

    /// One active row
    pub async fn get(&self, id: i64) -> LifecycleResult<EntityRow> {
        self.store
            .find(self.def, id, Scope::Active)
            .await?
            .ok_or(LifecycleError::NotFound)
    }

    /// Insert every item or none
    pub async fn create(
        &self,
        batch: &[EntityFields],
        actor: &str,
    ) -> LifecycleResult<Vec<EntityRecord>> {
        if let Some(errors) = validate::first_invalid(self.def, batch) {
            return Err(LifecycleError::Validation(errors));
        }

        let mut tx = self.store.begin().await?;
        let result = self.create_items(tx.as_mut(), batch, actor).await;
        finish(tx, result).await
    }

    /// Apply every item or none.
    ///
    /// Items without an id are created; items with an id are overwritten, or
    /// soft-deleted when `is_deleted` is set. Either way the stored
    /// `log_version` goes up by one.
    pub async fn update(
        &self,
        batch: &[UpdateEntity],
        actor: &str,
    ) -> LifecycleResult<Vec<EntityRecord>> {
        if let Some(errors) = validate::first_invalid(self.def, batch.iter().map(|i| &i.fields)) {
            return Err(LifecycleError::Validation(errors));
        }

        let mut tx = self.store.begin().await?;
        let result = self.update_items(tx.as_mut(), batch, actor).await;
        finish(tx, result).await
    }

    /// Soft-delete an active row
    pub async fn delete(&self, id: i64, actor: &str) -> LifecycleResult<EntityRecord> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut record = tx
                .find_for_update(self.def, id, Scope::Active)
                .await?
                .ok_or(LifecycleError::NotFound)?;
            record.deleted_at = Some(Utc::now());
            record.deleted_by = Some(actor.to_owned());
            tx.save(self.def, &record).await?;
            Ok::<_, LifecycleError>(record)
        }
        .await;
        finish(tx, result).await
    }

    /// Bring a row back, clearing both deletion fields
    pub async fn restore(&self, id: i64) -> LifecycleResult<EntityRecord> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut record = tx
                .find_for_update(self.def, id, Scope::Any)
                .await?
                .ok_or(LifecycleError::NotFound)?;
            record.deleted_at = None;
            record.deleted_by = None;
            tx.save(self.def, &record).await?;
            Ok::<_, LifecycleError>(record)
        }
        .await;
        finish(tx, result).await
    }

    async fn create_items(
        &self,
        tx: &mut dyn EntityTx,
        batch: &[EntityFields],
        actor: &str,
    ) -> LifecycleResult<Vec<EntityRecord>> {
        let ctx = HookContext {
            def: self.def,
            actor,
        };
        let mut created = Vec::with_capacity(batch.len());
        for fields in batch {
            let record = tx.insert(self.def, fields, actor).await?;
            self.hooks.after_create(&ctx, &record).await?;
            created.push(record);
        }
        Ok(created)
    }

    async fn update_items(
        &self,
        tx: &mut dyn EntityTx,
        batch: &[UpdateEntity],
        actor: &str,
    ) -> LifecycleResult<Vec<EntityRecord>> {
        let ctx = HookContext {
            def: self.def,
            actor,
        };
        let mut applied = Vec::with_capacity(batch.len());

        for item in batch {
            self.hooks.before_update(tx, &ctx, item).await?;

            let Some(id) = item.id else {
                let record = tx.insert(self.def, &item.fields, actor).await?;
                self.hooks.after_create(&ctx, &record).await?;
                applied.push(record);
                continue;
            };

            let mut record = tx
                .find_for_update(self.def, id, Scope::Active)
                .await?
                .ok_or(LifecycleError::NotFound)?;

            if let Some(expected) = item.log_version
                && expected != record.log_version
            {
                return Err(LifecycleError::VersionConflict {
                    expected,
                    stored: record.log_version,
                });
            }
            record.log_version += 1;

            let now = Utc::now();
            if item.is_deleted {
                record.deleted_at = Some(now);
                record.deleted_by = Some(actor.to_owned());
            } else {
                record.overwrite(&item.fields);
                record.updated_by = Some(actor.to_owned());
            }
            record.updated_at = now;

            tx.save(self.def, &record).await?;
            applied.push(record);
        }

        Ok(applied)
    }
}

/// Commit on success, roll back on error
async fn finish<T>(tx: Box<dyn EntityTx>, result: LifecycleResult<T>) -> LifecycleResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{GROUP, MemoryEntityStore, TEAM};

    struct Fixture {
        store: Arc<MemoryEntityStore>,
        teams: EntityLifecycle,
        groups: EntityLifecycle,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryEntityStore::new());
        let hooks: Arc<dyn LifecycleHooks> = Arc::new(StandardHooks::default());
        Fixture {
            teams: EntityLifecycle::new(&TEAM, store.clone(), hooks.clone()),
            groups: EntityLifecycle::new(&GROUP, store.clone(), hooks),
            store,
        }
    }

    fn fields(parent_id: i64, name: &str) -> EntityFields {
        EntityFields {
            parent_id: Some(parent_id),
            names: vec![name.into(), name.into(), name.into()],
            shortcut: String::new(),
        }
    }

    /// A group whose department FK points at a real department
    async fn seed_group(f: &Fixture) -> i64 {
        let departments = EntityLifecycle::new(
            &crate::db::DEPARTMENT,
            f.store.clone(),
            Arc::new(StandardHooks::default()),
        );
        let dept = departments
            .create(
                &[EntityFields {
                    parent_id: None,
                    names: vec!["D".into(), "D".into(), "D".into()],
                    shortcut: String::new(),
                }],
                "1105",
            )
            .await
            .unwrap();
        let group = f
            .groups
            .create(&[fields(dept[0].id, "G")], "1105")
            .await
            .unwrap();
        group[0].id
    }

    #[tokio::test]
    async fn test_create_starts_at_version_zero() {
        let f = fixture();
        let group = seed_group(&f).await;
        let created = f.teams.create(&[fields(group, "A")], "1105").await.unwrap();

        assert_eq!(created[0].log_version, 0);
        assert!(created[0].deleted_at.is_none());
        assert_eq!(created[0].created_by.as_deref(), Some("1105"));
        assert_eq!(f.teams.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_item_persists_nothing() {
        let f = fixture();
        let group = seed_group(&f).await;
        let mut bad = fields(group, "D");
        bad.names[1].clear();

        let err = f
            .teams
            .create(
                &[fields(group, "A"), fields(group, "B"), fields(group, "C"), bad],
                "1105",
            )
            .await
            .unwrap_err();
        match err {
            LifecycleError::Validation(errors) => assert!(errors.contains_key("team_name_en")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(f.store.list(&TEAM, Scope::Any).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_batch() {
        let f = fixture();
        let group = seed_group(&f).await;

        let err = f
            .teams
            .create(&[fields(group, "A"), fields(group + 100, "B")], "1105")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Storage(StoreError::ForeignKey(_))));
        assert!(f.store.list(&TEAM, Scope::Any).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_bumps_version_by_one() {
        let f = fixture();
        let group = seed_group(&f).await;
        let team = f.teams.create(&[fields(group, "A")], "1105").await.unwrap()[0].clone();

        let item = UpdateEntity {
            id: Some(team.id),
            fields: fields(group, "Renamed"),
            ..Default::default()
        };
        f.teams.update(&[item.clone()], "2001").await.unwrap();
        f.teams.update(&[item], "2001").await.unwrap();

        let row = f.teams.get(team.id).await.unwrap();
        assert_eq!(row.record.log_version, 2);
        assert_eq!(row.record.names[0], "Renamed");
        assert_eq!(row.record.updated_by.as_deref(), Some("2001"));
        assert_eq!(row.record.created_by.as_deref(), Some("1105"));
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let f = fixture();
        let group = seed_group(&f).await;
        let team = f.teams.create(&[fields(group, "A")], "1105").await.unwrap()[0].clone();

        let stale = UpdateEntity {
            id: Some(team.id),
            fields: fields(group, "B"),
            log_version: Some(7),
            ..Default::default()
        };
        let err = f.teams.update(&[stale], "1105").await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::VersionConflict {
                expected: 7,
                stored: 0
            }
        ));

        let fresh = UpdateEntity {
            id: Some(team.id),
            fields: fields(group, "B"),
            log_version: Some(0),
            ..Default::default()
        };
        let applied = f.teams.update(&[fresh], "1105").await.unwrap();
        assert_eq!(applied[0].log_version, 1);
    }

    #[tokio::test]
    async fn test_update_batch_is_atomic() {
        let f = fixture();
        let group = seed_group(&f).await;
        let team = f.teams.create(&[fields(group, "A")], "1105").await.unwrap()[0].clone();

        let batch = [
            UpdateEntity {
                id: Some(team.id),
                fields: fields(group, "Changed"),
                ..Default::default()
            },
            UpdateEntity {
                id: Some(team.id + 50),
                fields: fields(group, "Ghost"),
                ..Default::default()
            },
        ];
        let err = f.teams.update(&batch, "1105").await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound));

        let row = f.teams.get(team.id).await.unwrap();
        assert_eq!(row.record.names[0], "A");
        assert_eq!(row.record.log_version, 0);
    }

    #[tokio::test]
    async fn test_update_checks_parent_first() {
        let f = fixture();
        let group = seed_group(&f).await;
        let item = UpdateEntity {
            id: Some(999),
            fields: fields(group + 1, "A"),
            ..Default::default()
        };
        let err = f.teams.update(&[item], "1105").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Referential(_)));
    }

    #[tokio::test]
    async fn test_update_without_id_creates() {
        let f = fixture();
        let group = seed_group(&f).await;
        let item = UpdateEntity {
            fields: fields(group, "New"),
            ..Default::default()
        };
        let applied = f.teams.update(&[item], "1105").await.unwrap();
        assert_eq!(applied[0].log_version, 0);
        assert_eq!(f.teams.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_restore_round_trip() {
        let f = fixture();
        let group = seed_group(&f).await;
        let team = f.teams.create(&[fields(group, "A")], "1105").await.unwrap()[0].clone();

        let deleted = f.teams.delete(team.id, "2001").await.unwrap();
        assert_eq!(deleted.deleted_by.as_deref(), Some("2001"));
        assert!(f.teams.list(false).await.unwrap().is_empty());
        assert_eq!(f.teams.list(true).await.unwrap().len(), 1);
        assert!(matches!(f.teams.get(team.id).await, Err(LifecycleError::NotFound)));
        assert!(matches!(
            f.teams.delete(team.id, "2001").await,
            Err(LifecycleError::NotFound)
        ));

        let restored = f.teams.restore(team.id).await.unwrap();
        assert_eq!(restored, team);
        assert!(f.teams.list(true).await.unwrap().is_empty());
        assert!(matches!(f.teams.restore(999).await, Err(LifecycleError::NotFound)));
    }
}
