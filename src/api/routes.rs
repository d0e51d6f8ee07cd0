//! Admin route handlers
//!
//! Triggers only enqueue; the response carries the task handle and the
//! outcome is read back from the task or the operation log.

use super::error::AppError;
use super::AppState;
use crate::core::scheduler::task::SyncTask;
use crate::core::sync::params::{DATE_FROM, DATE_TO, STORE_ID};
use crate::domain::{
    OperationFilter, OperationId, OperationKind, OperationParams, OperationRecord, TaskId,
};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Accepted acknowledgement for a trigger
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub message: String,
    pub task_id: TaskId,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryTrigger {
    #[serde(default)]
    store_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct OrderExportTrigger {
    #[serde(default)]
    date_from: Option<String>,
    #[serde(default)]
    date_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OperationsQuery {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// Operation record plus its derived duration
#[derive(Debug, Serialize)]
pub struct OperationView {
    #[serde(flatten)]
    pub record: OperationRecord,
    pub duration_seconds: Option<f64>,
}

impl From<OperationRecord> for OperationView {
    fn from(record: OperationRecord) -> Self {
        let duration_seconds = record
            .duration()
            .map(|d| d.num_milliseconds() as f64 / 1000.0);
        Self {
            record,
            duration_seconds,
        }
    }
}

/// Empty bodies are allowed; anything else must be a JSON object
fn optional_body<T>(body: &Bytes) -> Result<T, AppError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("invalid body: {e}")))
}

async fn enqueue(
    state: &AppState,
    kind: OperationKind,
    params: OperationParams,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let task = state.dispatcher.trigger(kind, params).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(TaskAccepted {
            message: format!("{} queued", kind.as_str().replace('_', " ")),
            task_id: task.id,
        }),
    ))
}

pub async fn trigger_products(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    enqueue(&state, OperationKind::ProductSync, OperationParams::new()).await
}

pub async fn trigger_inventory(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let request: InventoryTrigger = optional_body(&body)?;
    let mut params = OperationParams::new();
    if let Some(store_id) = request.store_id.filter(|v| !v.is_null()) {
        params.insert(STORE_ID.to_string(), store_id);
    }
    enqueue(&state, OperationKind::InventorySync, params).await
}

pub async fn trigger_order_export(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let request: OrderExportTrigger = optional_body(&body)?;
    let mut params = OperationParams::new();
    if let Some(from) = request.date_from {
        params.insert(DATE_FROM.to_string(), Value::String(from));
    }
    if let Some(to) = request.date_to {
        params.insert(DATE_TO.to_string(), Value::String(to));
    }
    enqueue(&state, OperationKind::OrderExport, params).await
}

fn parse_task_id(raw: &str) -> Result<TaskId, AppError> {
    raw.parse().map_err(AppError::bad_request)
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SyncTask>, AppError> {
    let id = parse_task_id(&id)?;
    state
        .dispatcher
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("task {id} not found")))
}

pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskAccepted>, AppError> {
    let id = parse_task_id(&id)?;
    if state.dispatcher.cancel(&id).await? {
        return Ok(Json(TaskAccepted {
            message: "task cancelled".to_string(),
            task_id: id,
        }));
    }

    match state.dispatcher.get(&id).await? {
        None => Err(AppError::not_found(format!("task {id} not found"))),
        Some(task) => Err(AppError::conflict(format!(
            "task {id} is {} and cannot be cancelled",
            task.status
        ))),
    }
}

pub async fn list_operations(
    State(state): State<AppState>,
    Query(query): Query<OperationsQuery>,
) -> Result<Json<Vec<OperationView>>, AppError> {
    let filter = OperationFilter {
        kind: query
            .kind
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(AppError::bad_request)?,
        status: query
            .status
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(AppError::bad_request)?,
        limit: query.limit,
    };

    let records = state.oplog.list(&filter).await?;
    Ok(Json(records.into_iter().map(OperationView::from).collect()))
}

pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OperationView>, AppError> {
    let id: OperationId = id.parse().map_err(AppError::bad_request)?;
    state
        .oplog
        .get(&id)
        .await?
        .map(|record| Json(record.into()))
        .ok_or_else(|| AppError::not_found(format!("operation {id} not found")))
}
