//! Operation log: the audit ledger of sync invocations
//!
//! Every invocation opens exactly one record as `running` and closes it as
//! `completed`, `partial` or `failed`. Records are never deleted except by the
//! retention purge, which only touches terminal records.

use crate::adapters::database::{OperationLogStorage, SyncStorage};
use crate::core::sync::batch::BatchTally;
use crate::domain::{
    OperationFilter, OperationId, OperationKind, OperationParams, OperationRecord, OperationStatus,
    Result,
};
use crate::{log_operation_complete, log_operation_start};
use chrono::{DateTime, Duration, Utc};
use std::fmt::Display;
use std::sync::Arc;

/// Ledger manager over the operation log storage
#[derive(Clone)]
pub struct OperationLog {
    storage: Arc<dyn SyncStorage>,
}

impl OperationLog {
    pub fn new(storage: Arc<dyn SyncStorage>) -> Self {
        Self { storage }
    }

    /// Creates and persists a `running` record
    pub async fn open(
        &self,
        kind: OperationKind,
        parameters: OperationParams,
    ) -> Result<OperationRecord> {
        let mut record = OperationRecord::new(kind, parameters);
        record.mark_running();
        self.storage.insert_operation(&record).await?;
        log_operation_start!(record.id, record.kind);
        Ok(record)
    }

    /// Closes a record after the batch loop ran to the end
    pub async fn close(&self, record: &mut OperationRecord, tally: BatchTally) -> Result<()> {
        record.finish(tally.processed, tally.succeeded, tally.failed, tally.messages);
        self.storage.update_operation(record).await?;
        log_operation_complete!(record);
        Ok(())
    }

    /// Closes a record after a batch-level failure
    pub async fn fail(&self, record: &mut OperationRecord, error: &(dyn Display + Sync)) -> Result<()> {
        record.fail(error.to_string());
        self.storage.update_operation(record).await?;
        tracing::error!(
            operation_id = %record.id,
            kind = %record.kind,
            error = %error,
            "Sync operation failed"
        );
        Ok(())
    }

    pub async fn get(&self, id: &OperationId) -> Result<Option<OperationRecord>> {
        self.storage.get_operation(id).await
    }

    /// Newest first
    pub async fn list(&self, filter: &OperationFilter) -> Result<Vec<OperationRecord>> {
        self.storage.list_operations(filter).await
    }

    /// Deletes terminal records completed before `cutoff`
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let purged = self.storage.purge_operations_before(cutoff).await?;
        tracing::info!(cutoff = %cutoff, purged, "Purged operation log");
        Ok(purged)
    }

    /// Retention purge: records completed more than `days` days before `now`
    pub async fn purge_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<u64> {
        self.purge_before(now - Duration::days(i64::from(days))).await
    }

    /// Closes a record left `running` by a worker that died mid-batch
    ///
    /// # Returns
    ///
    /// `true` if the record was still running and has been closed.
    pub async fn close_interrupted(&self, id: &OperationId) -> Result<bool> {
        let Some(mut record) = self.storage.get_operation(id).await? else {
            return Ok(false);
        };
        if record.status != OperationStatus::Running {
            return Ok(false);
        }

        record.fail("interrupted: the worker stopped before the operation finished");
        self.storage.update_operation(&record).await?;
        tracing::warn!(operation_id = %record.id, kind = %record.kind, "Closed interrupted operation");
        Ok(true)
    }
}
