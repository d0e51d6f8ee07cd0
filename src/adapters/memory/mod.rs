//! In-process storage backend
//!
//! Implements every storage trait over a single mutex-guarded state. Used by
//! the test suite and for local dry runs (`database_target = "memory"`).
//! Nothing survives a restart.

use crate::adapters::database::traits::{
    CatalogStorage, EndpointStorage, InventoryStorage, LeaseStorage, OperationLogStorage,
    OrderStorage, StorageBackend, TaskStorage,
};
use crate::core::scheduler::task::{SyncTask, TaskStatus};
use crate::core::sync::reconciler::ReconciliationPlan;
use crate::domain::{
    CatalogItem, ExportReceipt, ExportWindow, InventoryKey, InventoryLevel, InventoryMovement,
    OperationFilter, OperationId, OperationRecord, OrderExportCandidate, OrderId, OrderStatus,
    Result, Sku, Store, StoreId, SyncError, TaskId, Taxon, TaxonId, TaxonomyKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    taxa: Vec<Taxon>,
    items: BTreeMap<Sku, CatalogItem>,
    stores: Vec<Store>,
    levels: HashMap<InventoryKey, InventoryLevel>,
    movements: Vec<InventoryMovement>,
    orders: Vec<OrderExportCandidate>,
    receipts: HashMap<OrderId, ExportReceipt>,
    operations: HashMap<OperationId, OperationRecord>,
    tasks: HashMap<TaskId, SyncTask>,
    leases: HashMap<String, Lease>,
    endpoint_syncs: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    expires_at: DateTime<Utc>,
}

/// Mutex-guarded in-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a store; stores are owned outside this subsystem
    pub async fn insert_store(&self, slug: &str, name: &str) -> Store {
        let store = Store {
            id: StoreId::new(),
            slug: slug.to_string(),
            name: name.to_string(),
        };
        self.state.lock().await.stores.push(store.clone());
        store
    }

    /// Writes a level directly, bypassing the movement ledger
    pub async fn seed_level(&self, level: InventoryLevel) {
        self.state
            .lock()
            .await
            .levels
            .insert(level.key.clone(), level);
    }

    /// Adds an order; orders are owned outside this subsystem
    pub async fn insert_order(&self, order: OrderExportCandidate) {
        self.state.lock().await.orders.push(order);
    }

    /// Every task, oldest first
    pub async fn list_tasks(&self) -> Vec<SyncTask> {
        let mut tasks: Vec<SyncTask> = self.state.lock().await.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl CatalogStorage for MemoryStorage {
    async fn find_or_create_taxon(
        &self,
        kind: TaxonomyKind,
        name: &str,
        slug: &str,
    ) -> Result<Taxon> {
        let mut state = self.state.lock().await;
        if let Some(taxon) = state
            .taxa
            .iter()
            .find(|t| t.kind == kind && t.name == name)
        {
            return Ok(taxon.clone());
        }

        let taxon = Taxon {
            id: TaxonId::new(),
            kind,
            name: name.to_string(),
            slug: slug.to_string(),
        };
        state.taxa.push(taxon.clone());
        Ok(taxon)
    }

    async fn list_taxa(&self, kind: TaxonomyKind) -> Result<Vec<Taxon>> {
        let state = self.state.lock().await;
        let mut taxa: Vec<Taxon> = state.taxa.iter().filter(|t| t.kind == kind).cloned().collect();
        taxa.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(taxa)
    }

    async fn find_item_by_sku(&self, sku: &Sku) -> Result<Option<CatalogItem>> {
        Ok(self.state.lock().await.items.get(sku).cloned())
    }

    async fn upsert_item(&self, item: &CatalogItem) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.items.get_mut(&item.sku) {
            Some(existing) => {
                let id = existing.id;
                *existing = CatalogItem {
                    id,
                    ..item.clone()
                };
                Ok(false)
            }
            None => {
                state.items.insert(item.sku.clone(), item.clone());
                Ok(true)
            }
        }
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>> {
        Ok(self.state.lock().await.items.values().cloned().collect())
    }
}

#[async_trait]
impl InventoryStorage for MemoryStorage {
    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>> {
        let state = self.state.lock().await;
        Ok(state.stores.iter().find(|s| s.slug == slug).cloned())
    }

    async fn get_level(&self, key: &InventoryKey) -> Result<Option<InventoryLevel>> {
        Ok(self.state.lock().await.levels.get(key).cloned())
    }

    async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<()> {
        let mut state = self.state.lock().await;

        let current = state.levels.get(&plan.key).map(|l| l.quantity);
        if current != plan.expected_previous {
            return Err(SyncError::Conflict(format!(
                "inventory level {} changed: expected {:?}, found {:?}",
                plan.key, plan.expected_previous, current
            )));
        }

        if let Some(ref movement) = plan.movement {
            state.movements.push(movement.clone());
        }
        state.levels.insert(plan.key.clone(), plan.level.clone());
        Ok(())
    }

    async fn list_movements(&self, key: &InventoryKey) -> Result<Vec<InventoryMovement>> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| &m.key == key)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStorage for MemoryStorage {
    async fn select_export_candidates(
        &self,
        statuses: &[OrderStatus],
        window: &ExportWindow,
    ) -> Result<Vec<OrderExportCandidate>> {
        let state = self.state.lock().await;
        let mut candidates: Vec<OrderExportCandidate> = state
            .orders
            .iter()
            .filter(|o| statuses.contains(&o.status))
            .filter(|o| window.contains(o.created_at))
            .filter(|o| !state.receipts.contains_key(&o.id))
            .cloned()
            .collect();
        candidates.sort_by_key(|o| o.created_at);
        Ok(candidates)
    }

    async fn record_export_receipt(&self, receipt: &ExportReceipt) -> Result<()> {
        self.state
            .lock()
            .await
            .receipts
            .insert(receipt.order_id, receipt.clone());
        Ok(())
    }

    async fn get_export_receipt(&self, order_id: &OrderId) -> Result<Option<ExportReceipt>> {
        Ok(self.state.lock().await.receipts.get(order_id).cloned())
    }
}

#[async_trait]
impl OperationLogStorage for MemoryStorage {
    async fn insert_operation(&self, record: &OperationRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.operations.contains_key(&record.id) {
            return Err(SyncError::Conflict(format!(
                "operation {} already exists",
                record.id
            )));
        }
        state.operations.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_operation(&self, record: &OperationRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.operations.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(SyncError::NotFound(format!("operation {}", record.id))),
        }
    }

    async fn get_operation(&self, id: &OperationId) -> Result<Option<OperationRecord>> {
        Ok(self.state.lock().await.operations.get(id).cloned())
    }

    async fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<OperationRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<OperationRecord> = state
            .operations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(filter.effective_limit());
        Ok(records)
    }

    async fn purge_operations_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.operations.len();
        state.operations.retain(|_, r| {
            !(r.is_terminal() && r.completed_at.map_or(false, |at| at < cutoff))
        });
        Ok((before - state.operations.len()) as u64)
    }
}

#[async_trait]
impl TaskStorage for MemoryStorage {
    async fn enqueue_task(&self, task: &SyncTask) -> Result<()> {
        self.state.lock().await.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn claim_due_task(&self, now: DateTime<Utc>, worker: &str) -> Result<Option<SyncTask>> {
        let mut state = self.state.lock().await;
        let next = state
            .tasks
            .values()
            .filter(|t| t.is_due(now))
            .min_by_key(|t| (t.next_eligible_at, t.created_at))
            .map(|t| t.id);

        Ok(next.and_then(|id| {
            state.tasks.get_mut(&id).map(|task| {
                task.claim(worker, now);
                task.clone()
            })
        }))
    }

    async fn update_task(&self, task: &SyncTask) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(SyncError::NotFound(format!("task {}", task.id))),
        }
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<SyncTask>> {
        Ok(self.state.lock().await.tasks.get(id).cloned())
    }

    async fn cancel_task(&self, id: &TaskId, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(id) {
            Some(task) if task.status == TaskStatus::Queued => {
                task.cancel(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn requeue_stale_tasks(
        &self,
        claimed_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SyncTask>> {
        let mut state = self.state.lock().await;
        let mut requeued = Vec::new();
        for task in state.tasks.values_mut() {
            let stale = task.status == TaskStatus::Running
                && task.claimed_at.map_or(true, |at| at < claimed_before);
            if stale {
                task.requeue_after_crash(now);
                requeued.push(task.clone());
            }
        }
        Ok(requeued)
    }
}

#[async_trait]
impl LeaseStorage for MemoryStorage {
    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| SyncError::Validation(format!("lease ttl out of range: {e}")))?;
        let mut state = self.state.lock().await;

        if let Some(lease) = state.leases.get(key) {
            if lease.holder != holder && lease.expires_at > now {
                return Ok(false);
            }
        }

        state.leases.insert(
            key.to_string(),
            Lease {
                holder: holder.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.leases.get(key).map_or(false, |l| l.holder == holder) {
            state.leases.remove(key);
        }
        Ok(())
    }
}

#[async_trait]
impl EndpointStorage for MemoryStorage {
    async fn record_endpoint_sync(&self, system: &str, at: DateTime<Utc>) -> Result<()> {
        self.state
            .lock()
            .await
            .endpoint_syncs
            .insert(system.to_string(), at);
        Ok(())
    }

    async fn endpoint_last_sync(&self, system: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.endpoint_syncs.get(system).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, OperationKind, OperationParams, OperationStatus};

    #[tokio::test]
    async fn test_lease_exclusion_and_expiry() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let ttl = Duration::from_secs(60);

        assert!(storage.try_acquire_lease("k", "w1", ttl, now).await.unwrap());
        assert!(!storage.try_acquire_lease("k", "w2", ttl, now).await.unwrap());
        assert!(storage.try_acquire_lease("k", "w1", ttl, now).await.unwrap());

        let later = now + chrono::Duration::seconds(61);
        assert!(storage.try_acquire_lease("k", "w2", ttl, later).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_by_non_holder_is_noop() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let ttl = Duration::from_secs(60);

        storage.try_acquire_lease("k", "w1", ttl, now).await.unwrap();
        storage.release_lease("k", "w2").await.unwrap();
        assert!(!storage.try_acquire_lease("k", "w2", ttl, now).await.unwrap());

        storage.release_lease("k", "w1").await.unwrap();
        assert!(storage.try_acquire_lease("k", "w2", ttl, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let task = SyncTask::new(OperationKind::ProductSync, OperationParams::new(), 3, now);
        storage.enqueue_task(&task).await.unwrap();

        let claimed = storage.claim_due_task(now, "w1").await.unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::Running);
        assert!(storage.claim_due_task(now, "w2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_reconciliation_detects_conflict() {
        let storage = MemoryStorage::new();
        let key = InventoryKey::new(StoreId::new(), ItemId::new(), None);
        let level = InventoryLevel {
            key: key.clone(),
            quantity: 5,
            reserved: 0,
            price: rust_decimal::Decimal::ONE,
            online_available: true,
            last_restocked: None,
            updated_at: Utc::now(),
        };
        storage.seed_level(level.clone()).await;

        let plan = ReconciliationPlan {
            key: key.clone(),
            expected_previous: Some(4),
            level,
            movement: None,
        };
        let err = storage.apply_reconciliation(&plan).await.unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_purge_keeps_running_records() {
        let storage = MemoryStorage::new();
        let mut done = OperationRecord::new(OperationKind::ProductSync, OperationParams::new());
        done.mark_running();
        done.finish(0, 0, 0, vec![]);
        let mut running = OperationRecord::new(OperationKind::ProductSync, OperationParams::new());
        running.mark_running();

        storage.insert_operation(&done).await.unwrap();
        storage.insert_operation(&running).await.unwrap();

        let purged = storage
            .purge_operations_before(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);

        let left = storage
            .list_operations(&OperationFilter::default())
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].status, OperationStatus::Running);
    }
}
