//! Seam between the worker pool and the orchestrator

use crate::adapters::database::SyncStorage;
use crate::config::CatalogSyncConfig;
use crate::core::sync::SyncOrchestrator;
use crate::domain::{OperationKind, OperationParams, OperationRecord, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs one invocation of an operation kind
#[async_trait]
pub trait OperationRunner: Send + Sync {
    async fn run(&self, kind: OperationKind, parameters: &OperationParams)
        -> Result<OperationRecord>;
}

#[async_trait]
impl OperationRunner for SyncOrchestrator {
    async fn run(
        &self,
        kind: OperationKind,
        parameters: &OperationParams,
    ) -> Result<OperationRecord> {
        SyncOrchestrator::run(self, kind, parameters).await
    }
}

/// Resolves the endpoint from configuration on every invocation
///
/// A missing or ambiguous endpoint then fails the task with a configuration
/// error before any record is opened.
pub struct ConfiguredRunner {
    config: Arc<CatalogSyncConfig>,
    storage: Arc<dyn SyncStorage>,
}

impl ConfiguredRunner {
    pub fn new(config: Arc<CatalogSyncConfig>, storage: Arc<dyn SyncStorage>) -> Self {
        Self { config, storage }
    }
}

#[async_trait]
impl OperationRunner for ConfiguredRunner {
    async fn run(
        &self,
        kind: OperationKind,
        parameters: &OperationParams,
    ) -> Result<OperationRecord> {
        let orchestrator = SyncOrchestrator::from_config(&self.config, self.storage.clone())?;
        orchestrator.run(kind, parameters).await
    }
}
