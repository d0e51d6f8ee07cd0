//! Storage abstraction traits
//!
//! Every backend (PostgreSQL, in-memory) implements the full set. The engine
//! holds them behind one [`SyncStorage`] trait object.

use crate::core::scheduler::task::SyncTask;
use crate::core::sync::reconciler::ReconciliationPlan;
use crate::domain::{
    CatalogItem, ExportReceipt, ExportWindow, InventoryKey, InventoryLevel, InventoryMovement,
    OperationFilter, OperationId, OperationRecord, OrderExportCandidate, OrderId, OrderStatus,
    Result, Sku, Store, TaskId, Taxon, TaxonomyKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Backend lifecycle
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend label for logs ("postgresql", "memory")
    fn backend_name(&self) -> &'static str;

    /// Test the storage connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    /// Create tables and indexes if they don't exist
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    async fn ensure_schema(&self) -> Result<()>;
}

/// Catalog items and their category/brand taxonomy
#[async_trait]
pub trait CatalogStorage: Send + Sync {
    /// Returns the taxon with this kind and name, creating it with `slug` if absent
    ///
    /// Idempotent: concurrent callers with the same name end up with the same row.
    async fn find_or_create_taxon(
        &self,
        kind: TaxonomyKind,
        name: &str,
        slug: &str,
    ) -> Result<Taxon>;

    /// All taxa of one kind, by name
    async fn list_taxa(&self, kind: TaxonomyKind) -> Result<Vec<Taxon>>;

    async fn find_item_by_sku(&self, sku: &Sku) -> Result<Option<CatalogItem>>;

    /// Inserts the item, or overwrites every field of the row with the same SKU
    ///
    /// # Returns
    ///
    /// `true` if a new row was created.
    async fn upsert_item(&self, item: &CatalogItem) -> Result<bool>;

    /// All items, by SKU
    async fn list_items(&self) -> Result<Vec<CatalogItem>>;
}

/// Stores, stock levels and the movement ledger
#[async_trait]
pub trait InventoryStorage: Send + Sync {
    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>>;

    async fn get_level(&self, key: &InventoryKey) -> Result<Option<InventoryLevel>>;

    /// Applies a reconciliation plan atomically: movement first, then the level
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::SyncError::Conflict`] if the stored quantity no
    /// longer matches `plan.expected_previous` (or a level appeared where none
    /// was expected). Nothing is written in that case.
    async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<()>;

    /// Movements of one key in creation order
    async fn list_movements(&self, key: &InventoryKey) -> Result<Vec<InventoryMovement>>;
}

/// Read view over orders plus export receipts
#[async_trait]
pub trait OrderStorage: Send + Sync {
    /// Orders in one of `statuses`, created inside `window`, without a receipt
    ///
    /// Ordered by creation time.
    async fn select_export_candidates(
        &self,
        statuses: &[OrderStatus],
        window: &ExportWindow,
    ) -> Result<Vec<OrderExportCandidate>>;

    async fn record_export_receipt(&self, receipt: &ExportReceipt) -> Result<()>;

    async fn get_export_receipt(&self, order_id: &OrderId) -> Result<Option<ExportReceipt>>;
}

/// Persistence of the operation ledger
#[async_trait]
pub trait OperationLogStorage: Send + Sync {
    async fn insert_operation(&self, record: &OperationRecord) -> Result<()>;

    async fn update_operation(&self, record: &OperationRecord) -> Result<()>;

    async fn get_operation(&self, id: &OperationId) -> Result<Option<OperationRecord>>;

    /// Records matching `filter`, newest first, at most `filter.effective_limit()`
    async fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<OperationRecord>>;

    /// Deletes terminal records completed before `cutoff`
    ///
    /// # Returns
    ///
    /// Number of deleted records.
    async fn purge_operations_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Durable task queue
#[async_trait]
pub trait TaskStorage: Send + Sync {
    async fn enqueue_task(&self, task: &SyncTask) -> Result<()>;

    /// Claims the oldest queued task whose `next_eligible_at <= now`
    ///
    /// The claimed task is returned already marked running by `worker`. Two
    /// workers never claim the same task.
    async fn claim_due_task(&self, now: DateTime<Utc>, worker: &str) -> Result<Option<SyncTask>>;

    async fn update_task(&self, task: &SyncTask) -> Result<()>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<SyncTask>>;

    /// Cancels a queued task
    ///
    /// # Returns
    ///
    /// `false` if the task is not queued (running or already terminal).
    async fn cancel_task(&self, id: &TaskId, now: DateTime<Utc>) -> Result<bool>;

    /// Returns tasks running since before `claimed_before` to the queue
    ///
    /// An attempt that had begun stays counted.
    ///
    /// # Returns
    ///
    /// The requeued tasks, as stored after the update.
    async fn requeue_stale_tasks(
        &self,
        claimed_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SyncTask>>;
}

/// Time-bounded mutual exclusion per (operation kind, parameters)
#[async_trait]
pub trait LeaseStorage: Send + Sync {
    /// Takes the lease if it is free, expired, or already held by `holder`
    ///
    /// # Returns
    ///
    /// `true` if `holder` now owns the lease until `now + ttl`.
    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Releases the lease if `holder` owns it; a no-op otherwise
    async fn release_lease(&self, key: &str, holder: &str) -> Result<()>;
}

/// Last successful sync per external system
#[async_trait]
pub trait EndpointStorage: Send + Sync {
    async fn record_endpoint_sync(&self, system: &str, at: DateTime<Utc>) -> Result<()>;

    async fn endpoint_last_sync(&self, system: &str) -> Result<Option<DateTime<Utc>>>;
}

/// Everything the engine needs from a backend
pub trait SyncStorage:
    StorageBackend
    + CatalogStorage
    + InventoryStorage
    + OrderStorage
    + OperationLogStorage
    + TaskStorage
    + LeaseStorage
    + EndpointStorage
{
}

impl<T> SyncStorage for T where
    T: StorageBackend
        + CatalogStorage
        + InventoryStorage
        + OrderStorage
        + OperationLogStorage
        + TaskStorage
        + LeaseStorage
        + EndpointStorage
{
}
