//! Soft-deletable versioned record
//!
//! [`EntityRecord`] is the stored shape shared by every resource. Payloads
//! come in as loose JSON objects keyed by the resource's column names and are
//! parsed against its [`ResourceDef`]; records go out the same way.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use super::resource::ResourceDef;

/// Body or field of the wrong JSON type
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid payload: {0}")]
pub struct PayloadError(pub String);

/// One stored row
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: i64,
    pub parent_id: Option<i64>,
    /// Aligned with [`ResourceDef::name_columns`]
    pub names: Vec<String>,
    pub shortcut: String,
    pub log_version: i64,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EntityRecord {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Replace every mutable column
    pub fn overwrite(&mut self, fields: &EntityFields) {
        self.parent_id = fields.parent_id;
        self.names = fields.names.clone();
        self.shortcut = fields.shortcut.clone();
    }

    pub fn to_json(&self, def: &ResourceDef) -> Value {
        let mut obj = Map::new();
        obj.insert(def.id_column.into(), self.id.into());
        if let Some(column) = def.parent_column() {
            obj.insert(column.into(), self.parent_id.into());
        }
        for (column, name) in def.name_columns.iter().zip(&self.names) {
            obj.insert((*column).into(), name.as_str().into());
        }
        obj.insert(def.shortcut_column.into(), self.shortcut.as_str().into());
        obj.insert("log_version".into(), self.log_version.into());
        obj.insert("created_by".into(), self.created_by.clone().into());
        obj.insert("updated_by".into(), self.updated_by.clone().into());
        obj.insert("deleted_by".into(), self.deleted_by.clone().into());
        obj.insert("created_at".into(), self.created_at.to_rfc3339().into());
        obj.insert("updated_at".into(), self.updated_at.to_rfc3339().into());
        obj.insert(
            "deleted_at".into(),
            self.deleted_at.map(|t| t.to_rfc3339()).into(),
        );
        Value::Object(obj)
    }
}

/// A record with its eagerly loaded parent (`None` when the parent is
/// soft-deleted or the resource has none)
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub record: EntityRecord,
    pub parent: Option<EntityRecord>,
}

impl EntityRow {
    pub fn to_json(&self, def: &ResourceDef) -> Value {
        let mut value = self.record.to_json(def);
        if let (Some(parent_def), Value::Object(obj)) = (def.parent, &mut value) {
            let parent = self
                .parent
                .as_ref()
                .map_or(Value::Null, |p| p.to_json(parent_def));
            obj.insert(parent_def.name.into(), parent);
        }
        value
    }
}

/// Client-supplied mutable columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFields {
    pub parent_id: Option<i64>,
    pub names: Vec<String>,
    pub shortcut: String,
}

impl EntityFields {
    pub fn from_json(def: &ResourceDef, obj: &Map<String, Value>) -> Result<Self, PayloadError> {
        let parent_id = match def.parent_column() {
            Some(column) => int_field(obj, column)?,
            None => None,
        };
        let names = def
            .name_columns
            .iter()
            .map(|column| string_field(obj, column))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            parent_id,
            names,
            shortcut: string_field(obj, def.shortcut_column)?,
        })
    }
}

/// One item of an update batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateEntity {
    /// `None` creates a new row
    pub id: Option<i64>,
    pub fields: EntityFields,
    /// Soft-delete instead of overwrite
    pub is_deleted: bool,
    /// Expected stored version; checked only when present
    pub log_version: Option<i64>,
}

impl UpdateEntity {
    pub fn from_json(def: &ResourceDef, obj: &Map<String, Value>) -> Result<Self, PayloadError> {
        let is_deleted = match obj.get("is_deleted") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(PayloadError("is_deleted must be a boolean".into())),
        };

        Ok(Self {
            id: int_field(obj, def.id_column)?.filter(|id| *id != 0),
            fields: EntityFields::from_json(def, obj)?,
            is_deleted,
            log_version: int_field(obj, "log_version")?,
        })
    }
}

/// Parse a JSON array of objects with `item`
pub fn parse_batch<T>(
    body: &Value,
    item: impl Fn(&Map<String, Value>) -> Result<T, PayloadError>,
) -> Result<Vec<T>, PayloadError> {
    let Value::Array(items) = body else {
        return Err(PayloadError("body must be an array".into()));
    };
    items
        .iter()
        .map(|value| match value {
            Value::Object(obj) => item(obj),
            _ => Err(PayloadError("batch items must be objects".into())),
        })
        .collect()
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Result<String, PayloadError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(PayloadError(format!("{key} must be a string"))),
    }
}

fn int_field(obj: &Map<String, Value>, key: &str) -> Result<Option<i64>, PayloadError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| PayloadError(format!("{key} must be an integer"))),
    }
}
