//! CLI command implementations
//!
//! Every command returns a process exit code: 0 ok, 2 configuration error,
//! 3 partial or failed operation, 4 connection error, 5 fatal.

pub mod init;
pub mod operations;
pub mod purge;
pub mod run;
pub mod serve;
pub mod task;
pub mod trigger;
pub mod validate;

use crate::adapters::database::{create_storage, SyncStorage};
use crate::config::{load_config, CatalogSyncConfig};
use crate::core::sync::params::{inventory_params, window_params};
use crate::domain::{ExportWindow, OperationKind, OperationParams, OperationRecord};
use chrono::NaiveDate;
use clap::Args;
use std::sync::Arc;

/// Parameters shared by `trigger` and `run`
#[derive(Args, Debug, Clone)]
pub struct OperationArgs {
    /// Operation kind: product_sync, inventory_sync or order_export
    pub kind: OperationKind,

    /// External store identifier (inventory_sync only)
    #[arg(long)]
    pub store_id: Option<String>,

    /// First day of the export window, YYYY-MM-DD (order_export only)
    #[arg(long)]
    pub date_from: Option<NaiveDate>,

    /// Day after the export window, YYYY-MM-DD (order_export only)
    #[arg(long)]
    pub date_to: Option<NaiveDate>,
}

impl OperationArgs {
    /// Builds the invocation parameters, rejecting flags that don't apply to the kind
    pub fn parameters(&self) -> Result<OperationParams, String> {
        match self.kind {
            OperationKind::ProductSync => {
                if self.store_id.is_some() || self.date_from.is_some() || self.date_to.is_some() {
                    return Err("product_sync takes no parameters".to_string());
                }
                Ok(OperationParams::new())
            }
            OperationKind::InventorySync => {
                if self.date_from.is_some() || self.date_to.is_some() {
                    return Err("--date-from/--date-to only apply to order_export".to_string());
                }
                Ok(inventory_params(self.store_id.as_deref()))
            }
            OperationKind::OrderExport => {
                if self.store_id.is_some() {
                    return Err("--store-id only applies to inventory_sync".to_string());
                }
                let window = ExportWindow::new(self.date_from, self.date_to)?;
                Ok(window_params(&window))
            }
        }
    }
}

/// Loads and validates the configuration, printing the failure
pub(crate) fn load_or_report(config_path: &str) -> Result<CatalogSyncConfig, i32> {
    load_config(config_path).map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        eprintln!("❌ Failed to load configuration: {e}");
        2
    })
}

/// Opens the configured storage and checks the connection
pub(crate) async fn connect_storage(
    config: &CatalogSyncConfig,
) -> Result<Arc<dyn SyncStorage>, i32> {
    let storage = create_storage(config).await.map_err(|e| {
        eprintln!("❌ Failed to create storage: {e}");
        if e.is_configuration() {
            2
        } else {
            4
        }
    })?;
    storage.test_connection().await.map_err(|e| {
        eprintln!("❌ Failed to connect to storage: {e}");
        4
    })?;
    Ok(storage)
}

/// Prints an operation record the way every command shows it
pub(crate) fn print_record(record: &OperationRecord) {
    println!("Operation {}", record.id);
    println!("  Kind: {}", record.kind);
    println!("  Status: {}", record.status);
    if !record.parameters.is_empty() {
        println!(
            "  Parameters: {}",
            serde_json::to_string(&record.parameters).unwrap_or_default()
        );
    }
    println!(
        "  Processed: {}  Succeeded: {}  Failed: {}",
        record.processed, record.succeeded, record.failed
    );
    if let Some(started) = record.started_at {
        println!("  Started: {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(duration) = record.duration() {
        println!(
            "  Duration: {:.2}s",
            duration.num_milliseconds() as f64 / 1000.0
        );
    }
    if let Some(ref error) = record.error_details {
        println!("  Error: {error}");
    }
    if !record.messages.is_empty() {
        println!("  Messages:");
        for message in &record.messages {
            println!("    - {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::params::{DATE_FROM, STORE_ID};

    fn args(kind: OperationKind) -> OperationArgs {
        OperationArgs {
            kind,
            store_id: None,
            date_from: None,
            date_to: None,
        }
    }

    #[test]
    fn test_inventory_parameters() {
        let mut a = args(OperationKind::InventorySync);
        a.store_id = Some("12".to_string());
        let params = a.parameters().unwrap();
        assert_eq!(params[STORE_ID], "12");
    }

    #[test]
    fn test_order_export_parameters() {
        let mut a = args(OperationKind::OrderExport);
        a.date_from = NaiveDate::from_ymd_opt(2025, 3, 1);
        let params = a.parameters().unwrap();
        assert_eq!(params[DATE_FROM], "2025-03-01");
    }

    #[test]
    fn test_mismatched_flags_are_rejected() {
        let mut a = args(OperationKind::ProductSync);
        a.store_id = Some("12".to_string());
        assert!(a.parameters().is_err());

        let mut b = args(OperationKind::OrderExport);
        b.store_id = Some("12".to_string());
        assert!(b.parameters().is_err());
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let mut a = args(OperationKind::OrderExport);
        a.date_from = NaiveDate::from_ymd_opt(2025, 3, 2);
        a.date_to = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert!(a.parameters().is_err());
    }
}
