//! Generic resource handlers
//!
//! The same seven routes are mounted for every [`ResourceDef`]; the resource
//! reaches the handler as a request extension.

use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, put},
};
use serde_json::Value;
use shared::{AppError, AppResult, DataResponse, MessageKey};

use crate::auth::CurrentUser;
use crate::db::{EntityFields, EntityRow, ResourceDef, UpdateEntity, parse_batch};
use crate::error::Operation;
use crate::lifecycle::LifecycleError;
use crate::state::AppState;

/// Resource served by the matched route
#[derive(Debug, Clone, Copy)]
pub struct Resource(pub &'static ResourceDef);

/// `GET /R`, `GET /R/all`, `GET /R/{id}`, `POST /R`, `PUT /R`,
/// `DELETE /R/{id}`, `PUT /R/restore/{id}`
pub fn router(def: &'static ResourceDef) -> Router<AppState> {
    let base = format!("/{}", def.name);
    Router::new()
        .route(&base, get(list).post(create).put(update))
        .route(&format!("{base}/all"), get(list_deleted))
        .route(&format!("{base}/{{id}}"), get(get_by_id).delete(delete))
        .route(&format!("{base}/restore/{{id}}"), put(restore))
        .layer(Extension(Resource(def)))
}

/// GET /R - active rows
async fn list(
    State(state): State<AppState>,
    Extension(Resource(def)): Extension<Resource>,
) -> AppResult<DataResponse> {
    let rows = state
        .lifecycle(def)
        .list(false)
        .await
        .map_err(|e| e.into_app_error(Operation::List))?;
    Ok(DataResponse::success(MessageKey::GetDataSuccess, render(def, &rows)))
}

/// GET /R/all - soft-deleted rows
async fn list_deleted(
    State(state): State<AppState>,
    Extension(Resource(def)): Extension<Resource>,
) -> AppResult<DataResponse> {
    let rows = state
        .lifecycle(def)
        .list(true)
        .await
        .map_err(|e| e.into_app_error(Operation::List))?;
    Ok(DataResponse::success(MessageKey::GetDataSuccess, render(def, &rows)))
}

/// GET /R/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Extension(Resource(def)): Extension<Resource>,
    Path(id): Path<String>,
) -> AppResult<DataResponse> {
    let id = parse_id(&id).ok_or_else(|| AppError::new(MessageKey::GetDataFail))?;
    let row = state
        .lifecycle(def)
        .get(id)
        .await
        .map_err(|e| e.into_app_error(Operation::Get))?;
    Ok(DataResponse::success(MessageKey::GetDataSuccess, row.to_json(def)))
}

/// POST /R - create a batch
async fn create(
    State(state): State<AppState>,
    Extension(Resource(def)): Extension<Resource>,
    user: CurrentUser,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<DataResponse> {
    let body = json_body(body)?;
    let batch = parse_batch(&body, |obj| EntityFields::from_json(def, obj))
        .map_err(|e| LifecycleError::from(e).into_app_error(Operation::Create))?;

    let created = state
        .lifecycle(def)
        .create(&batch, &user.username)
        .await
        .map_err(|e| e.into_app_error(Operation::Create))?;

    tracing::info!(resource = def.name, count = created.len(), actor = %user.username, "Created");
    let data = created.iter().map(|r| r.to_json(def)).collect();
    Ok(DataResponse::success(MessageKey::CreateSuccess, Value::Array(data)))
}

/// PUT /R - update / soft-delete / create a batch
async fn update(
    State(state): State<AppState>,
    Extension(Resource(def)): Extension<Resource>,
    user: CurrentUser,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<DataResponse> {
    let body = json_body(body)?;
    let batch = parse_batch(&body, |obj| UpdateEntity::from_json(def, obj))
        .map_err(|e| LifecycleError::from(e).into_app_error(Operation::Update))?;

    let applied = state
        .lifecycle(def)
        .update(&batch, &user.username)
        .await
        .map_err(|e| e.into_app_error(Operation::Update))?;

    tracing::info!(resource = def.name, count = applied.len(), actor = %user.username, "Updated");
    let data = applied.iter().map(|r| r.to_json(def)).collect();
    Ok(DataResponse::success(MessageKey::UpdateSuccess, Value::Array(data)))
}

/// DELETE /R/{id} - soft delete
async fn delete(
    State(state): State<AppState>,
    Extension(Resource(def)): Extension<Resource>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<DataResponse> {
    let id = parse_id(&id).ok_or_else(|| AppError::new(MessageKey::NotIdExists))?;
    state
        .lifecycle(def)
        .delete(id, &user.username)
        .await
        .map_err(|e| e.into_app_error(Operation::Delete))?;

    tracing::info!(resource = def.name, id, actor = %user.username, "Soft-deleted");
    Ok(DataResponse::done(MessageKey::DeleteSuccess))
}

/// PUT /R/restore/{id}
async fn restore(
    State(state): State<AppState>,
    Extension(Resource(def)): Extension<Resource>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<DataResponse> {
    let id = parse_id(&id).ok_or_else(|| AppError::new(MessageKey::NotIdExists))?;
    state
        .lifecycle(def)
        .restore(id)
        .await
        .map_err(|e| e.into_app_error(Operation::Restore))?;

    tracing::info!(resource = def.name, id, actor = %user.username, "Restored");
    Ok(DataResponse::done(MessageKey::RestoreSuccess))
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> AppResult<Value> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unreadable request body");
        AppError::new(MessageKey::ParamError)
    })
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok().filter(|id| *id > 0)
}

fn render(def: &ResourceDef, rows: &[EntityRow]) -> Value {
    Value::Array(rows.iter().map(|row| row.to_json(def)).collect())
}
