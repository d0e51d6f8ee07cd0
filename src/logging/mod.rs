//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted file logs with rotation
//! - Configurable log levels (`RUST_LOG` wins when set)
//! - Macros for the events every sync run emits
//!
//! Operator alerts are ordinary `error` events on the `catalog_sync::alert`
//! target, so any subscriber can route them separately; see
//! [`crate::core::scheduler::alert`].
//!
//! # Example
//!
//! ```no_run
//! use catalog_sync::logging::init_logging;
//! use catalog_sync::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Tracing target of operator alerts
pub const ALERT_TARGET: &str = "catalog_sync::alert";

/// Log the start of a sync operation
///
/// # Example
///
/// ```no_run
/// use catalog_sync::log_operation_start;
/// use catalog_sync::domain::{OperationId, OperationKind};
///
/// let id = OperationId::new();
/// log_operation_start!(&id, OperationKind::ProductSync);
/// ```
#[macro_export]
macro_rules! log_operation_start {
    ($operation_id:expr, $kind:expr) => {
        tracing::info!(
            operation_id = %$operation_id,
            kind = %$kind,
            "Starting sync operation"
        );
    };
}

/// Log the closing of a sync operation record
///
/// # Example
///
/// ```no_run
/// use catalog_sync::log_operation_complete;
/// use catalog_sync::domain::{OperationKind, OperationParams, OperationRecord};
///
/// let record = OperationRecord::new(OperationKind::OrderExport, OperationParams::new());
/// log_operation_complete!(&record);
/// ```
#[macro_export]
macro_rules! log_operation_complete {
    ($record:expr) => {
        tracing::info!(
            operation_id = %$record.id,
            kind = %$record.kind,
            status = %$record.status,
            processed = $record.processed,
            succeeded = $record.succeeded,
            failed = $record.failed,
            duration_ms = $record.duration().map(|d| d.num_milliseconds()).unwrap_or(0),
            "Sync operation closed"
        );
    };
}

/// Log a single record that failed inside a batch
///
/// # Example
///
/// ```no_run
/// use catalog_sync::log_record_failure;
///
/// log_record_failure!("product", "RAY-3025", "Mapping error: missing name");
/// ```
#[macro_export]
macro_rules! log_record_failure {
    ($entity:expr, $key:expr, $error:expr) => {
        tracing::warn!(
            entity = $entity,
            key = %$key,
            error = %$error,
            "Record failed"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use catalog_sync::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Transport error: request timed out");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = $reason,
            "Retrying operation"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{OperationId, OperationKind, OperationParams, OperationRecord};

    #[test]
    fn test_macros_expand() {
        let id = OperationId::new();
        log_operation_start!(&id, OperationKind::InventorySync);

        let record = OperationRecord::new(OperationKind::InventorySync, OperationParams::new());
        log_operation_complete!(&record);
        log_record_failure!("inventory", "SKU-1", "bad quantity");
        log_retry_attempt!(1, 3, "timeout");
    }
}
