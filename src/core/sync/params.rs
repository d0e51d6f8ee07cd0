//! Caller-supplied parameters of each operation kind
//!
//! Parameters travel as a JSON map (task queue, operation log, admin API);
//! these helpers are the only place that knows their keys.

use crate::domain::{ExportWindow, OperationKind, OperationParams, Result, SyncError};
use chrono::NaiveDate;
use serde_json::Value;

pub const STORE_ID: &str = "store_id";
pub const DATE_FROM: &str = "date_from";
pub const DATE_TO: &str = "date_to";

pub fn inventory_params(store_id: Option<&str>) -> OperationParams {
    let mut params = OperationParams::new();
    if let Some(store_id) = store_id {
        params.insert(STORE_ID.to_string(), Value::from(store_id));
    }
    params
}

/// Optional store filter; numeric ids are accepted and rendered as text
pub fn store_id_from_params(params: &OperationParams) -> Result<Option<String>> {
    match params.get(STORE_ID) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(SyncError::Validation(format!(
            "store_id must be a string, got {other}"
        ))),
    }
}

pub fn window_params(window: &ExportWindow) -> OperationParams {
    let mut params = OperationParams::new();
    if let Some(from) = window.date_from {
        params.insert(DATE_FROM.to_string(), Value::from(from.to_string()));
    }
    if let Some(to) = window.date_to {
        params.insert(DATE_TO.to_string(), Value::from(to.to_string()));
    }
    params
}

fn date_param(params: &OperationParams, key: &str) -> Result<Option<NaiveDate>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| SyncError::Validation(format!("{key} must be an ISO date, got '{s}'"))),
        Some(other) => Err(SyncError::Validation(format!(
            "{key} must be an ISO date, got {other}"
        ))),
    }
}

/// `[date_from, date_to)` window from parameters
///
/// # Errors
///
/// [`SyncError::Validation`] for unparsable dates or `date_from >= date_to`.
pub fn window_from_params(params: &OperationParams) -> Result<ExportWindow> {
    ExportWindow::new(date_param(params, DATE_FROM)?, date_param(params, DATE_TO)?)
        .map_err(SyncError::Validation)
}

/// Rebuilds `params` from their parsed form
///
/// Two parameter maps the orchestrator would read identically normalize to
/// the same map. Keys a kind does not read are dropped.
///
/// # Errors
///
/// [`SyncError::Validation`] when the parameters do not parse.
pub fn normalized_params(kind: OperationKind, params: &OperationParams) -> Result<OperationParams> {
    match kind {
        OperationKind::ProductSync => Ok(OperationParams::new()),
        OperationKind::InventorySync => {
            Ok(inventory_params(store_id_from_params(params)?.as_deref()))
        }
        OperationKind::OrderExport => Ok(window_params(&window_from_params(params)?)),
    }
}
