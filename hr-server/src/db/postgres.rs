//! PostgreSQL entity store
//!
//! SQL is assembled from the static identifiers of a [`ResourceDef`]; values
//! are always bound, never interpolated.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::record::{EntityFields, EntityRecord, EntityRow};
use super::resource::ResourceDef;
use super::{EntityStore, EntityTx, Scope, StoreResult};

/// Alias prefix of joined parent columns
const PARENT_PREFIX: &str = "p__";

#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn list(&self, def: &'static ResourceDef, scope: Scope) -> StoreResult<Vec<EntityRow>> {
        let sql = select_with_parent(def, scope, false);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| decode_row(row, def).map_err(Into::into))
            .collect()
    }

    async fn find(
        &self,
        def: &'static ResourceDef,
        id: i64,
        scope: Scope,
    ) -> StoreResult<Option<EntityRow>> {
        let sql = select_with_parent(def, scope, true);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(|r| decode_row(r, def)).transpose()?)
    }

    async fn begin(&self) -> StoreResult<Box<dyn EntityTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgEntityTx { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgEntityTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl EntityTx for PgEntityTx {
    async fn find_for_update(
        &mut self,
        def: &'static ResourceDef,
        id: i64,
        scope: Scope,
    ) -> StoreResult<Option<EntityRecord>> {
        let mut conditions = vec![format!("{} = $1", def.id_column)];
        conditions.extend(scope_condition(scope, ""));
        let sql = format!(
            "SELECT {} FROM {} WHERE {} FOR UPDATE",
            def.columns().join(", "),
            def.table,
            conditions.join(" AND ")
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(|r| decode_record(r, def, "")).transpose()?)
    }

    async fn exists(&mut self, def: &'static ResourceDef, id: i64) -> StoreResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1 AND deleted_at IS NULL)",
            def.table, def.id_column
        );
        let found: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(found)
    }

    async fn insert(
        &mut self,
        def: &'static ResourceDef,
        fields: &EntityFields,
        actor: &str,
    ) -> StoreResult<EntityRecord> {
        let mut columns: Vec<&str> = def.parent_column().into_iter().collect();
        columns.extend_from_slice(def.name_columns);
        columns.extend_from_slice(&[
            def.shortcut_column,
            "log_version",
            "created_by",
            "created_at",
            "updated_at",
        ]);
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            def.table,
            columns.join(", "),
            placeholders(columns.len()),
            def.columns().join(", ")
        );

        let now = chrono::Utc::now();
        let mut query = sqlx::query(&sql);
        if def.parent.is_some() {
            query = query.bind(fields.parent_id);
        }
        for name in &fields.names {
            query = query.bind(name.as_str());
        }
        let row = query
            .bind(fields.shortcut.as_str())
            .bind(0_i64)
            .bind(actor)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(decode_record(&row, def, "")?)
    }

    async fn save(&mut self, def: &'static ResourceDef, record: &EntityRecord) -> StoreResult<()> {
        let mut columns: Vec<&str> = def.parent_column().into_iter().collect();
        columns.extend_from_slice(def.name_columns);
        columns.extend_from_slice(&[
            def.shortcut_column,
            "log_version",
            "updated_by",
            "deleted_by",
            "updated_at",
            "deleted_at",
        ]);
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ${}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${}",
            def.table,
            assignments,
            def.id_column,
            columns.len() + 1
        );

        let mut query = sqlx::query(&sql);
        if def.parent.is_some() {
            query = query.bind(record.parent_id);
        }
        for name in &record.names {
            query = query.bind(name.as_str());
        }
        query
            .bind(record.shortcut.as_str())
            .bind(record.log_version)
            .bind(record.updated_by.as_deref())
            .bind(record.deleted_by.as_deref())
            .bind(record.updated_at)
            .bind(record.deleted_at)
            .bind(record.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}

// ── SQL helpers ──

fn scope_condition(scope: Scope, alias: &str) -> Option<String> {
    match scope {
        Scope::Active => Some(format!("{alias}deleted_at IS NULL")),
        Scope::Deleted => Some(format!("{alias}deleted_at IS NOT NULL")),
        Scope::Any => None,
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("${i}")).collect::<Vec<_>>().join(", ")
}

/// SELECT of `def` joined with its active parent, ordered by id
fn select_with_parent(def: &ResourceDef, scope: Scope, by_id: bool) -> String {
    let mut columns: Vec<String> = def.columns().iter().map(|c| format!("t.{c}")).collect();
    let mut from = format!("{} t", def.table);

    if let Some(parent) = def.parent {
        columns.extend(
            parent
                .columns()
                .iter()
                .map(|c| format!("p.{c} AS {PARENT_PREFIX}{c}")),
        );
        from.push_str(&format!(
            " LEFT JOIN {} p ON p.{id} = t.{id} AND p.deleted_at IS NULL",
            parent.table,
            id = parent.id_column
        ));
    }

    let mut conditions: Vec<String> = scope_condition(scope, "t.").into_iter().collect();
    if by_id {
        conditions.push(format!("t.{} = $1", def.id_column));
    }
    let filter = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    format!(
        "SELECT {} FROM {}{} ORDER BY t.{}",
        columns.join(", "),
        from,
        filter,
        def.id_column
    )
}

fn decode_row(row: &PgRow, def: &ResourceDef) -> Result<EntityRow, sqlx::Error> {
    let record = decode_record(row, def, "")?;
    let parent = match def.parent {
        Some(parent_def) => {
            let parent_id: Option<i64> =
                row.try_get(format!("{PARENT_PREFIX}{}", parent_def.id_column).as_str())?;
            match parent_id {
                Some(_) => Some(decode_record(row, parent_def, PARENT_PREFIX)?),
                None => None,
            }
        }
        None => None,
    };
    Ok(EntityRow { record, parent })
}

fn decode_record(row: &PgRow, def: &ResourceDef, prefix: &str) -> Result<EntityRecord, sqlx::Error> {
    let column = |name: &str| format!("{prefix}{name}");

    let parent_id = match def.parent_column() {
        Some(c) => row.try_get(column(c).as_str())?,
        None => None,
    };
    let names = def
        .name_columns
        .iter()
        .map(|c| row.try_get::<String, _>(column(c).as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EntityRecord {
        id: row.try_get(column(def.id_column).as_str())?,
        parent_id,
        names,
        shortcut: row.try_get(column(def.shortcut_column).as_str())?,
        log_version: row.try_get(column("log_version").as_str())?,
        created_by: row.try_get(column("created_by").as_str())?,
        updated_by: row.try_get(column("updated_by").as_str())?,
        deleted_by: row.try_get(column("deleted_by").as_str())?,
        created_at: row.try_get(column("created_at").as_str())?,
        updated_at: row.try_get(column("updated_at").as_str())?,
        deleted_at: row.try_get(column("deleted_at").as_str())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::resource::{SHIFT, TEAM};

    #[test]
    fn test_select_joins_active_parent() {
        let sql = select_with_parent(&TEAM, Scope::Active, false);
        assert!(sql.starts_with("SELECT t.team_id, t.group_id, "));
        assert!(sql.contains("p.group_id AS p__group_id"));
        assert!(sql.contains("p.department_id AS p__department_id"));
        assert!(sql.contains(
            "LEFT JOIN tbl_group p ON p.group_id = t.group_id AND p.deleted_at IS NULL"
        ));
        assert!(sql.ends_with("WHERE t.deleted_at IS NULL ORDER BY t.team_id"));
    }

    #[test]
    fn test_select_without_parent() {
        let sql = select_with_parent(&SHIFT, Scope::Any, true);
        assert!(!sql.contains("JOIN"));
        assert!(sql.ends_with("FROM tbl_shift t WHERE t.shift_id = $1 ORDER BY t.shift_id"));

        let sql = select_with_parent(&SHIFT, Scope::Deleted, false);
        assert!(sql.contains("WHERE t.deleted_at IS NOT NULL"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "$1, $2, $3");
    }
}
