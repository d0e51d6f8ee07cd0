//! Operation log entries
//!
//! An [`OperationRecord`] is the audit ledger entry for one invocation of one
//! operation kind. It follows a small state machine:
//!
//! ```text
//! pending -> running -> { completed | partial | failed }
//! ```
//!
//! `completed_at` is set exactly when the status is terminal, and the counters
//! always satisfy `succeeded + failed <= processed`.

use crate::domain::ids::OperationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Caller-supplied input parameters of an invocation, kept in key order
pub type OperationParams = BTreeMap<String, Value>;

/// The three batch operations the engine knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ProductSync,
    InventorySync,
    OrderExport,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::ProductSync,
        OperationKind::InventorySync,
        OperationKind::OrderExport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::ProductSync => "product_sync",
            OperationKind::InventorySync => "inventory_sync",
            OperationKind::OrderExport => "order_export",
        }
    }

    /// Entity label used in per-record messages
    pub fn entity(&self) -> &'static str {
        match self {
            OperationKind::ProductSync => "product",
            OperationKind::InventorySync => "inventory",
            OperationKind::OrderExport => "order",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product_sync" | "products" => Ok(OperationKind::ProductSync),
            "inventory_sync" | "inventory" => Ok(OperationKind::InventorySync),
            "order_export" | "orders" => Ok(OperationKind::OrderExport),
            other => Err(format!(
                "Unknown operation kind '{other}'. Must be one of: product_sync, inventory_sync, order_export"
            )),
        }
    }
}

/// Lifecycle status of an operation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Running => "running",
            OperationStatus::Completed => "completed",
            OperationStatus::Partial => "partial",
            OperationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Partial | OperationStatus::Failed
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OperationStatus::Pending),
            "running" => Ok(OperationStatus::Running),
            "completed" => Ok(OperationStatus::Completed),
            "partial" => Ok(OperationStatus::Partial),
            "failed" => Ok(OperationStatus::Failed),
            other => Err(format!("Unknown operation status: {other}")),
        }
    }
}

/// Audit ledger entry for one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: OperationId,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub parameters: OperationParams,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub messages: Vec<String>,
    pub error_details: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OperationRecord {
    /// A fresh `pending` record
    pub fn new(kind: OperationKind, parameters: OperationParams) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            status: OperationStatus::Pending,
            parameters,
            processed: 0,
            succeeded: 0,
            failed: 0,
            messages: Vec::new(),
            error_details: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elapsed time between start and completion, once both are known
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }

    /// `pending -> running`
    pub fn mark_running(&mut self) {
        self.status = OperationStatus::Running;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
    }

    /// Closes the record after the batch loop ran to the end
    ///
    /// The status is `completed` when no record failed and `partial` otherwise.
    pub fn finish(&mut self, processed: u64, succeeded: u64, failed: u64, messages: Vec<String>) {
        // Counters can only describe records that were actually seen.
        let failed = failed.min(processed);
        let succeeded = succeeded.min(processed - failed);

        self.processed = processed;
        self.succeeded = succeeded;
        self.failed = failed;
        self.messages = messages;
        self.status = if failed == 0 {
            OperationStatus::Completed
        } else {
            OperationStatus::Partial
        };
        self.completed_at = Some(Utc::now());
    }

    /// Closes the record after a batch-level failure
    ///
    /// No partial counters are meaningful after a batch-level failure, so they
    /// are reset.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = OperationStatus::Failed;
        self.processed = 0;
        self.succeeded = 0;
        self.failed = 0;
        self.error_details = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Messages joined the way they are shown to operators
    pub fn message_log(&self) -> String {
        self.messages.join("\n")
    }
}

/// Filter for listing operation records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFilter {
    pub kind: Option<OperationKind>,
    pub status: Option<OperationStatus>,
    pub limit: Option<usize>,
}

impl OperationFilter {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn matches(&self, record: &OperationRecord) -> bool {
        self.kind.map_or(true, |k| k == record.kind)
            && self.status.map_or(true, |s| s == record.status)
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_pending() {
        let record = OperationRecord::new(OperationKind::ProductSync, OperationParams::new());
        assert_eq!(record.status, OperationStatus::Pending);
        assert!(record.started_at.is_none());
        assert!(record.completed_at.is_none());
        assert!(record.duration().is_none());
    }

    #[test]
    fn test_finish_without_failures_is_completed() {
        let mut record = OperationRecord::new(OperationKind::ProductSync, OperationParams::new());
        record.mark_running();
        record.finish(3, 3, 0, vec![]);

        assert_eq!(record.status, OperationStatus::Completed);
        assert!(record.completed_at.is_some());
        assert!(record.duration().unwrap().num_milliseconds() >= 0);
    }

    #[test]
    fn test_finish_with_failures_is_partial() {
        let mut record = OperationRecord::new(OperationKind::InventorySync, OperationParams::new());
        record.mark_running();
        record.finish(5, 3, 2, vec!["inventory X: bad".into()]);

        assert_eq!(record.status, OperationStatus::Partial);
        assert_eq!(record.message_log(), "inventory X: bad");
    }

    #[test]
    fn test_finish_clamps_counters() {
        let mut record = OperationRecord::new(OperationKind::OrderExport, OperationParams::new());
        record.mark_running();
        record.finish(2, 5, 1, vec![]);
        assert!(record.succeeded + record.failed <= record.processed);
    }

    #[test]
    fn test_fail_resets_counters() {
        let mut record = OperationRecord::new(OperationKind::ProductSync, OperationParams::new());
        record.mark_running();
        record.processed = 10;
        record.fail("Transport error: request timed out");

        assert_eq!(record.status, OperationStatus::Failed);
        assert_eq!(record.processed, 0);
        assert!(record.is_terminal());
        assert!(record.error_details.as_deref().unwrap().contains("timed out"));
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(
            OperationKind::from_str("inventory").unwrap(),
            OperationKind::InventorySync
        );
        assert_eq!(
            OperationKind::from_str("order_export").unwrap(),
            OperationKind::OrderExport
        );
        assert!(OperationKind::from_str("customer_sync").is_err());
    }

    #[test]
    fn test_filter_matches() {
        let mut record = OperationRecord::new(OperationKind::ProductSync, OperationParams::new());
        record.status = OperationStatus::Failed;

        let filter = OperationFilter {
            kind: Some(OperationKind::ProductSync),
            status: Some(OperationStatus::Failed),
            limit: None,
        };
        assert!(filter.matches(&record));
        assert!(!OperationFilter {
            kind: Some(OperationKind::OrderExport),
            ..Default::default()
        }
        .matches(&record));
    }

    #[test]
    fn test_record_serialization() {
        let mut params = OperationParams::new();
        params.insert("store_id".into(), Value::from("milano-centro"));
        let record = OperationRecord::new(OperationKind::InventorySync, params);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"inventory_sync\""));
        assert!(json.contains("milano-centro"));

        let back: OperationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
