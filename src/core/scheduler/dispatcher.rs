//! On-demand trigger path
//!
//! Triggering enqueues exactly one task and returns at once; the caller gets
//! the task handle and polls it, or the operation records it points to.

use super::task::SyncTask;
use crate::adapters::database::{SyncStorage, TaskStorage};
use crate::core::sync::params::normalized_params;
use crate::domain::{OperationKind, OperationParams, Result, TaskId};
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct TaskDispatcher {
    storage: Arc<dyn SyncStorage>,
    max_attempts: u32,
}

impl TaskDispatcher {
    pub fn new(storage: Arc<dyn SyncStorage>, max_attempts: u32) -> Self {
        Self {
            storage,
            max_attempts,
        }
    }

    /// Enqueues one invocation of `kind`
    ///
    /// Parameters are parsed here, so a malformed request is rejected
    /// synchronously, and stored in normalized form.
    ///
    /// # Errors
    ///
    /// [`SyncError::Validation`](crate::domain::SyncError::Validation) for
    /// malformed parameters, or storage errors.
    pub async fn trigger(
        &self,
        kind: OperationKind,
        parameters: OperationParams,
    ) -> Result<SyncTask> {
        let parameters = normalized_params(kind, &parameters)?;
        let task = SyncTask::new(kind, parameters, self.max_attempts, Utc::now());
        self.storage.enqueue_task(&task).await?;
        tracing::info!(task_id = %task.id, kind = %kind, "Sync task queued");
        Ok(task)
    }

    pub async fn get(&self, id: &TaskId) -> Result<Option<SyncTask>> {
        self.storage.get_task(id).await
    }

    /// Cancels a queued task; a running batch is never interrupted
    ///
    /// # Returns
    ///
    /// `true` if the task was queued and is now cancelled.
    pub async fn cancel(&self, id: &TaskId) -> Result<bool> {
        let cancelled = self.storage.cancel_task(id, Utc::now()).await?;
        if cancelled {
            tracing::info!(task_id = %id, "Sync task cancelled");
        }
        Ok(cancelled)
    }
}
