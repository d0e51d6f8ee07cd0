//! PostgreSQL adapter implementing the storage traits

use crate::adapters::database::traits::{
    CatalogStorage, EndpointStorage, InventoryStorage, LeaseStorage, OperationLogStorage,
    OrderStorage, StorageBackend, TaskStorage,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{
    item_from_row, level_from_row, movement_from_row, operation_from_row, order_from_row,
    order_line_from_row, receipt_from_row, store_from_row, task_from_row, taxon_from_row,
    to_bigint, variant_column,
};
use crate::core::scheduler::task::SyncTask;
use crate::core::sync::reconciler::ReconciliationPlan;
use crate::domain::{
    CatalogItem, ExportReceipt, ExportWindow, InventoryKey, InventoryLevel, InventoryMovement,
    OperationFilter, OperationId, OperationRecord, OrderExportCandidate, OrderId, OrderStatus,
    Result, Sku, Store, SyncError, TaskId, Taxon, TaxonId, TaxonomyKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, kind, parameters, status, attempts, max_attempts, next_eligible_at, \
     last_error, operation_ids, claimed_by, claimed_at, created_at, updated_at";

/// PostgreSQL implementation of every storage trait
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

fn db_error(context: &str) -> impl Fn(tokio_postgres::Error) -> SyncError + '_ {
    move |e| SyncError::Database(format!("{context}: {e}"))
}

fn operation_ids(task: &SyncTask) -> Vec<Uuid> {
    task.operation_ids.iter().map(|id| id.as_uuid()).collect()
}

#[async_trait]
impl StorageBackend for PostgreSQLAdapter {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }
}

#[async_trait]
impl CatalogStorage for PostgreSQLAdapter {
    async fn find_or_create_taxon(
        &self,
        kind: TaxonomyKind,
        name: &str,
        slug: &str,
    ) -> Result<Taxon> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = self
            .client
            .query(
                r#"
                INSERT INTO taxa (id, kind, name, slug)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (kind, name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id, kind, name, slug
                "#,
                &[&TaxonId::new().as_uuid(), &kind.as_str(), &name, &slug],
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Database(format!("{kind} '{name}' was not returned")))?;
        taxon_from_row(&row)
    }

    async fn list_taxa(&self, kind: TaxonomyKind) -> Result<Vec<Taxon>> {
        self.client
            .query(
                "SELECT id, kind, name, slug FROM taxa WHERE kind = $1 ORDER BY name",
                &[&kind.as_str()],
            )
            .await?
            .iter()
            .map(taxon_from_row)
            .collect()
    }

    async fn find_item_by_sku(&self, sku: &Sku) -> Result<Option<CatalogItem>> {
        self.client
            .query_opt("SELECT * FROM catalog_items WHERE sku = $1", &[&sku.as_str()])
            .await?
            .as_ref()
            .map(item_from_row)
            .transpose()
    }

    async fn upsert_item(&self, item: &CatalogItem) -> Result<bool> {
        let attributes = Value::Object(item.attributes.clone());
        let row = self
            .client
            .query(
                r#"
                INSERT INTO catalog_items (
                    id, sku, name, slug, description, short_description, category_id,
                    brand_id, price, cost_price, attributes, active, weight, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (sku) DO UPDATE SET
                    name = EXCLUDED.name,
                    slug = EXCLUDED.slug,
                    description = EXCLUDED.description,
                    short_description = EXCLUDED.short_description,
                    category_id = EXCLUDED.category_id,
                    brand_id = EXCLUDED.brand_id,
                    price = EXCLUDED.price,
                    cost_price = EXCLUDED.cost_price,
                    attributes = EXCLUDED.attributes,
                    active = EXCLUDED.active,
                    weight = EXCLUDED.weight,
                    updated_at = EXCLUDED.updated_at
                RETURNING (xmax = 0) AS inserted
                "#,
                &[
                    &item.id.as_uuid(),
                    &item.sku.as_str(),
                    &item.name,
                    &item.slug,
                    &item.description,
                    &item.short_description,
                    &item.category_id.as_uuid(),
                    &item.brand_id.as_uuid(),
                    &item.price,
                    &item.cost_price,
                    &attributes,
                    &item.active,
                    &item.weight,
                    &item.updated_at,
                ],
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Database(format!("upsert of {} returned nothing", item.sku)))?;

        crate::adapters::postgresql::models::column(&row, "inserted")
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>> {
        self.client
            .query("SELECT * FROM catalog_items ORDER BY sku", &[])
            .await?
            .iter()
            .map(item_from_row)
            .collect()
    }
}

#[async_trait]
impl InventoryStorage for PostgreSQLAdapter {
    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>> {
        self.client
            .query_opt("SELECT id, slug, name FROM stores WHERE slug = $1", &[&slug])
            .await?
            .as_ref()
            .map(store_from_row)
            .transpose()
    }

    async fn get_level(&self, key: &InventoryKey) -> Result<Option<InventoryLevel>> {
        self.client
            .query_opt(
                "SELECT * FROM inventory_levels WHERE store_id = $1 AND item_id = $2 AND variant = $3",
                &[
                    &key.store_id.as_uuid(),
                    &key.item_id.as_uuid(),
                    &variant_column(&key.variant),
                ],
            )
            .await?
            .as_ref()
            .map(level_from_row)
            .transpose()
    }

    /// Movement first, then the level, in one transaction
    ///
    /// The current quantity is locked and compared with the plan; a
    /// concurrent writer surfaces as [`SyncError::Conflict`].
    async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<()> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let store_id = plan.key.store_id.as_uuid();
        let item_id = plan.key.item_id.as_uuid();
        let variant = variant_column(&plan.key.variant);

        let current: Option<i64> = tx
            .query_opt(
                "SELECT quantity FROM inventory_levels \
                 WHERE store_id = $1 AND item_id = $2 AND variant = $3 FOR UPDATE",
                &[&store_id, &item_id, &variant],
            )
            .await
            .map_err(db_error("Failed to lock inventory level"))?
            .map(|row| row.try_get(0))
            .transpose()
            .map_err(db_error("Failed to read inventory level"))?;

        if current != plan.expected_previous {
            return Err(SyncError::Conflict(format!(
                "inventory level {} changed (expected {:?}, found {:?})",
                plan.key, plan.expected_previous, current
            )));
        }

        if let Some(movement) = &plan.movement {
            tx.execute(
                r#"
                INSERT INTO inventory_movements (
                    id, store_id, item_id, variant, kind, delta, resulting_quantity,
                    reference_id, notes, actor, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
                &[
                    &movement.id,
                    &store_id,
                    &item_id,
                    &variant,
                    &movement.kind.as_str(),
                    &movement.delta,
                    &movement.resulting_quantity,
                    &movement.reference_id,
                    &movement.notes,
                    &movement.actor,
                    &movement.created_at,
                ],
            )
            .await
            .map_err(db_error("Failed to insert inventory movement"))?;
        }

        let level = &plan.level;
        let written = if plan.is_creation() {
            tx.execute(
                r#"
                INSERT INTO inventory_levels (
                    store_id, item_id, variant, quantity, reserved, price,
                    online_available, last_restocked, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (store_id, item_id, variant) DO NOTHING
                "#,
                &[
                    &store_id,
                    &item_id,
                    &variant,
                    &level.quantity,
                    &level.reserved,
                    &level.price,
                    &level.online_available,
                    &level.last_restocked,
                    &level.updated_at,
                ],
            )
            .await
        } else {
            tx.execute(
                r#"
                UPDATE inventory_levels SET
                    quantity = $4,
                    reserved = $5,
                    price = $6,
                    online_available = $7,
                    last_restocked = $8,
                    updated_at = $9
                WHERE store_id = $1 AND item_id = $2 AND variant = $3
                "#,
                &[
                    &store_id,
                    &item_id,
                    &variant,
                    &level.quantity,
                    &level.reserved,
                    &level.price,
                    &level.online_available,
                    &level.last_restocked,
                    &level.updated_at,
                ],
            )
            .await
        }
        .map_err(db_error("Failed to write inventory level"))?;

        if written != 1 {
            return Err(SyncError::Conflict(format!(
                "inventory level {} was created concurrently",
                plan.key
            )));
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit reconciliation"))
    }

    async fn list_movements(&self, key: &InventoryKey) -> Result<Vec<InventoryMovement>> {
        self.client
            .query(
                "SELECT * FROM inventory_movements \
                 WHERE store_id = $1 AND item_id = $2 AND variant = $3 ORDER BY seq",
                &[
                    &key.store_id.as_uuid(),
                    &key.item_id.as_uuid(),
                    &variant_column(&key.variant),
                ],
            )
            .await?
            .iter()
            .map(movement_from_row)
            .collect()
    }
}

#[async_trait]
impl OrderStorage for PostgreSQLAdapter {
    async fn select_export_candidates(
        &self,
        statuses: &[OrderStatus],
        window: &ExportWindow,
    ) -> Result<Vec<OrderExportCandidate>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let mut orders = self
            .client
            .query(
                r#"
                SELECT o.* FROM orders o
                WHERE o.status = ANY($1)
                  AND ($2::timestamptz IS NULL OR o.created_at >= $2)
                  AND ($3::timestamptz IS NULL OR o.created_at < $3)
                  AND NOT EXISTS (
                      SELECT 1 FROM order_export_receipts r WHERE r.order_id = o.id
                  )
                ORDER BY o.created_at, o.order_number
                "#,
                &[&statuses, &window.start(), &window.end()],
            )
            .await?
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>>>()?;

        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let mut lines: HashMap<OrderId, Vec<_>> = HashMap::new();
        for row in self
            .client
            .query(
                "SELECT * FROM order_lines WHERE order_id = ANY($1) ORDER BY order_id, line_no",
                &[&ids],
            )
            .await?
        {
            let (order_id, line) = order_line_from_row(&row)?;
            lines.entry(order_id).or_default().push(line);
        }

        for order in &mut orders {
            order.items = lines.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }

    async fn record_export_receipt(&self, receipt: &ExportReceipt) -> Result<()> {
        self.client
            .execute(
                r#"
                INSERT INTO order_export_receipts (order_id, order_number, external_id, exported_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (order_id) DO UPDATE SET
                    external_id = EXCLUDED.external_id,
                    exported_at = EXCLUDED.exported_at
                "#,
                &[
                    &receipt.order_id.as_uuid(),
                    &receipt.order_number,
                    &receipt.external_id,
                    &receipt.exported_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_export_receipt(&self, order_id: &OrderId) -> Result<Option<ExportReceipt>> {
        self.client
            .query_opt(
                "SELECT * FROM order_export_receipts WHERE order_id = $1",
                &[&order_id.as_uuid()],
            )
            .await?
            .as_ref()
            .map(receipt_from_row)
            .transpose()
    }
}

#[async_trait]
impl OperationLogStorage for PostgreSQLAdapter {
    async fn insert_operation(&self, record: &OperationRecord) -> Result<()> {
        let parameters = serde_json::to_value(&record.parameters)?;
        let messages = serde_json::to_value(&record.messages)?;
        self.client
            .execute(
                r#"
                INSERT INTO operation_records (
                    id, kind, status, parameters, processed, succeeded, failed,
                    messages, error_details, started_at, completed_at, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
                &[
                    &record.id.as_uuid(),
                    &record.kind.as_str(),
                    &record.status.as_str(),
                    &parameters,
                    &to_bigint(record.processed),
                    &to_bigint(record.succeeded),
                    &to_bigint(record.failed),
                    &messages,
                    &record.error_details,
                    &record.started_at,
                    &record.completed_at,
                    &record.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_operation(&self, record: &OperationRecord) -> Result<()> {
        let messages = serde_json::to_value(&record.messages)?;
        let updated = self
            .client
            .execute(
                r#"
                UPDATE operation_records SET
                    status = $2,
                    processed = $3,
                    succeeded = $4,
                    failed = $5,
                    messages = $6,
                    error_details = $7,
                    started_at = $8,
                    completed_at = $9
                WHERE id = $1
                "#,
                &[
                    &record.id.as_uuid(),
                    &record.status.as_str(),
                    &to_bigint(record.processed),
                    &to_bigint(record.succeeded),
                    &to_bigint(record.failed),
                    &messages,
                    &record.error_details,
                    &record.started_at,
                    &record.completed_at,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(SyncError::NotFound(format!("operation {}", record.id)));
        }
        Ok(())
    }

    async fn get_operation(&self, id: &OperationId) -> Result<Option<OperationRecord>> {
        self.client
            .query_opt(
                "SELECT * FROM operation_records WHERE id = $1",
                &[&id.as_uuid()],
            )
            .await?
            .as_ref()
            .map(operation_from_row)
            .transpose()
    }

    async fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<OperationRecord>> {
        let kind = filter.kind.map(|k| k.as_str());
        let status = filter.status.map(|s| s.as_str());
        let limit = i64::try_from(filter.effective_limit()).unwrap_or(i64::MAX);

        self.client
            .query(
                r#"
                SELECT * FROM operation_records
                WHERE ($1::text IS NULL OR kind = $1)
                  AND ($2::text IS NULL OR status = $2)
                ORDER BY created_at DESC
                LIMIT $3
                "#,
                &[&kind, &status, &limit],
            )
            .await?
            .iter()
            .map(operation_from_row)
            .collect()
    }

    async fn purge_operations_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.client
            .execute(
                r#"
                DELETE FROM operation_records
                WHERE status IN ('completed', 'partial', 'failed')
                  AND completed_at < $1
                "#,
                &[&cutoff],
            )
            .await
    }
}

#[async_trait]
impl TaskStorage for PostgreSQLAdapter {
    async fn enqueue_task(&self, task: &SyncTask) -> Result<()> {
        let parameters = serde_json::to_value(&task.parameters)?;
        self.client
            .execute(
                &format!(
                    "INSERT INTO sync_tasks ({TASK_COLUMNS}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
                ),
                &[
                    &task.id.as_uuid(),
                    &task.kind.as_str(),
                    &parameters,
                    &task.status.as_str(),
                    &(task.attempts as i32),
                    &(task.max_attempts as i32),
                    &task.next_eligible_at,
                    &task.last_error,
                    &operation_ids(task),
                    &task.claimed_by,
                    &task.claimed_at,
                    &task.created_at,
                    &task.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    /// Claims the oldest due task; concurrent claimers skip locked rows
    async fn claim_due_task(&self, now: DateTime<Utc>, worker: &str) -> Result<Option<SyncTask>> {
        self.client
            .query_opt(
                &format!(
                    r#"
                    UPDATE sync_tasks SET
                        status = 'running',
                        claimed_by = $2,
                        claimed_at = $1,
                        updated_at = $1
                    WHERE id = (
                        SELECT id FROM sync_tasks
                        WHERE status = 'queued' AND next_eligible_at <= $1
                        ORDER BY next_eligible_at, created_at
                        LIMIT 1
                        FOR UPDATE SKIP LOCKED
                    )
                    RETURNING {TASK_COLUMNS}
                    "#
                ),
                &[&now, &worker],
            )
            .await?
            .as_ref()
            .map(task_from_row)
            .transpose()
    }

    async fn update_task(&self, task: &SyncTask) -> Result<()> {
        let updated = self
            .client
            .execute(
                r#"
                UPDATE sync_tasks SET
                    status = $2,
                    attempts = $3,
                    next_eligible_at = $4,
                    last_error = $5,
                    operation_ids = $6,
                    claimed_by = $7,
                    claimed_at = $8,
                    updated_at = $9
                WHERE id = $1
                "#,
                &[
                    &task.id.as_uuid(),
                    &task.status.as_str(),
                    &(task.attempts as i32),
                    &task.next_eligible_at,
                    &task.last_error,
                    &operation_ids(task),
                    &task.claimed_by,
                    &task.claimed_at,
                    &task.updated_at,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(SyncError::NotFound(format!("task {}", task.id)));
        }
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<SyncTask>> {
        self.client
            .query_opt(
                &format!("SELECT {TASK_COLUMNS} FROM sync_tasks WHERE id = $1"),
                &[&id.as_uuid()],
            )
            .await?
            .as_ref()
            .map(task_from_row)
            .transpose()
    }

    async fn cancel_task(&self, id: &TaskId, now: DateTime<Utc>) -> Result<bool> {
        let cancelled = self
            .client
            .execute(
                r#"
                UPDATE sync_tasks SET status = 'cancelled', updated_at = $2
                WHERE id = $1 AND status = 'queued'
                "#,
                &[&id.as_uuid(), &now],
            )
            .await?;
        Ok(cancelled == 1)
    }

    async fn requeue_stale_tasks(
        &self,
        claimed_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SyncTask>> {
        self.client
            .query(
                &format!(
                    r#"
                    UPDATE sync_tasks SET
                        status = 'queued',
                        next_eligible_at = $2,
                        last_error = 'worker interrupted; requeued',
                        claimed_by = NULL,
                        claimed_at = NULL,
                        updated_at = $2
                    WHERE status = 'running'
                      AND (claimed_at IS NULL OR claimed_at < $1)
                    RETURNING {TASK_COLUMNS}
                    "#
                ),
                &[&claimed_before, &now],
            )
            .await?
            .iter()
            .map(task_from_row)
            .collect()
    }
}

#[async_trait]
impl LeaseStorage for PostgreSQLAdapter {
    /// Insert, or steal when expired or already ours
    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| SyncError::Validation(format!("lease ttl out of range: {e}")))?;
        let acquired = self
            .client
            .execute(
                r#"
                INSERT INTO sync_leases (key, holder, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (key) DO UPDATE SET
                    holder = EXCLUDED.holder,
                    expires_at = EXCLUDED.expires_at
                WHERE sync_leases.expires_at <= $4 OR sync_leases.holder = EXCLUDED.holder
                "#,
                &[&key, &holder, &(now + ttl), &now],
            )
            .await?;
        Ok(acquired == 1)
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<()> {
        self.client
            .execute(
                "DELETE FROM sync_leases WHERE key = $1 AND holder = $2",
                &[&key, &holder],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EndpointStorage for PostgreSQLAdapter {
    async fn record_endpoint_sync(&self, system: &str, at: DateTime<Utc>) -> Result<()> {
        self.client
            .execute(
                r#"
                INSERT INTO endpoint_syncs (system, last_sync_at) VALUES ($1, $2)
                ON CONFLICT (system) DO UPDATE SET
                    last_sync_at = GREATEST(endpoint_syncs.last_sync_at, EXCLUDED.last_sync_at)
                "#,
                &[&system, &at],
            )
            .await?;
        Ok(())
    }

    async fn endpoint_last_sync(&self, system: &str) -> Result<Option<DateTime<Utc>>> {
        let row = self
            .client
            .query_opt(
                "SELECT last_sync_at FROM endpoint_syncs WHERE system = $1",
                &[&system],
            )
            .await?;
        row.map(|row| crate::adapters::postgresql::models::column(&row, "last_sync_at"))
            .transpose()
    }
}
