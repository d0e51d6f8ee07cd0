//! Sync orchestrator
//!
//! Drives one operation end to end: open the ledger entry, fetch or select
//! the batch, map and persist every record independently, close the entry.
//! A failing record is counted and logged; it never aborts the batch. A
//! failing fetch or select closes the entry as `failed` with no counters.

use super::batch::BatchTally;
use super::params::{inventory_params, store_id_from_params, window_from_params, window_params};
use super::reconciler::{InventoryReconciler, LevelUpdate};
use crate::adapters::database::{CatalogStorage, InventoryStorage, OrderStorage, SyncStorage};
use crate::adapters::external::{
    envelope_records, inventory_path, ExternalSystem, ExternalSystemClient, OrderAck, ORDERS_PATH,
    PRODUCTS_PATH,
};
use crate::config::{CatalogSyncConfig, SyncConfig};
use crate::core::mapping::{
    map_inbound_inventory, map_inbound_product, map_outbound_order, TaxonomyDefaults,
    TaxonomyResolver,
};
use crate::core::oplog::OperationLog;
use crate::domain::{
    ExportReceipt, ExportWindow, InventoryKey, OperationKind, OperationParams, OperationRecord,
    OrderExportCandidate, OrderStatus, Result, SyncError,
};
use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Settings that shape every invocation
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Reference id stamped on movements written by the sync
    pub sync_reference: String,
    pub record_opening_balance: bool,
    pub taxonomy: TaxonomyDefaults,
}

impl SyncSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            sync_reference: config.sync_reference.clone(),
            record_opening_balance: config.record_opening_balance,
            taxonomy: TaxonomyDefaults {
                category: config.default_category.clone(),
                brand: config.default_brand.clone(),
            },
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// Runs product sync, inventory sync and order export
pub struct SyncOrchestrator {
    client: Arc<dyn ExternalSystem>,
    storage: Arc<dyn SyncStorage>,
    oplog: OperationLog,
    reconciler: InventoryReconciler,
    taxonomy: TaxonomyDefaults,
}

impl SyncOrchestrator {
    pub fn new(
        client: Arc<dyn ExternalSystem>,
        storage: Arc<dyn SyncStorage>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            client,
            oplog: OperationLog::new(storage.clone()),
            storage,
            reconciler: InventoryReconciler::new(
                settings.sync_reference,
                settings.record_opening_balance,
            ),
            taxonomy: settings.taxonomy,
        }
    }

    /// Builds an orchestrator bound to the configured active endpoint
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`] when the endpoint named by `sync.system`
    /// is missing, inactive or ambiguous. Nothing has been logged yet.
    pub fn from_config(config: &CatalogSyncConfig, storage: Arc<dyn SyncStorage>) -> Result<Self> {
        let client = ExternalSystemClient::resolve(&config.external_systems, &config.sync.system)?;
        Ok(Self::new(
            Arc::new(client),
            storage,
            SyncSettings::from_config(&config.sync),
        ))
    }

    pub fn system_name(&self) -> &str {
        self.client.system_name()
    }

    /// Dispatches on the operation kind
    ///
    /// # Errors
    ///
    /// [`SyncError::Validation`] for malformed parameters (before any record
    /// is opened), or storage errors while writing the ledger.
    pub async fn run(
        &self,
        kind: OperationKind,
        parameters: &OperationParams,
    ) -> Result<OperationRecord> {
        match kind {
            OperationKind::ProductSync => self.sync_products().await,
            OperationKind::InventorySync => {
                let store_id = store_id_from_params(parameters)?;
                self.sync_inventory(store_id.as_deref()).await
            }
            OperationKind::OrderExport => {
                let window = window_from_params(parameters)?;
                self.export_orders(window).await
            }
        }
    }

    /// Imports the whole external product list
    pub async fn sync_products(&self) -> Result<OperationRecord> {
        let mut record = self
            .oplog
            .open(OperationKind::ProductSync, OperationParams::new())
            .await?;

        let batch = match self.fetch(PRODUCTS_PATH, "products").await {
            Ok(batch) => batch,
            Err(e) => {
                self.oplog.fail(&mut record, &e).await?;
                return Ok(record);
            }
        };

        let mut tally = BatchTally::new(batch.len());
        let mut resolver = TaxonomyResolver::new();
        for raw in &batch {
            let key = record_key(raw, "sku");
            match self.upsert_product(&mut resolver, raw).await {
                Ok(created) => tally.success(format!("product {key} {}", verb(created))),
                Err(e) => tally.failure("product", &key, &e),
            }
        }

        self.oplog.close(&mut record, tally).await?;
        Ok(record)
    }

    async fn upsert_product(&self, resolver: &mut TaxonomyResolver, raw: &Value) -> Result<bool> {
        let draft = map_inbound_product(raw, &self.taxonomy)?;
        let item = resolver.resolve(&*self.storage, draft).await?;
        self.storage.upsert_item(&item).await
    }

    /// Imports inventory levels, optionally for one store
    pub async fn sync_inventory(&self, store_id: Option<&str>) -> Result<OperationRecord> {
        let mut record = self
            .oplog
            .open(OperationKind::InventorySync, inventory_params(store_id))
            .await?;

        let batch = match self.fetch(&inventory_path(store_id), "inventory").await {
            Ok(batch) => batch,
            Err(e) => {
                self.oplog.fail(&mut record, &e).await?;
                return Ok(record);
            }
        };

        let mut tally = BatchTally::new(batch.len());
        for raw in &batch {
            let key = record_key(raw, "product_sku");
            match self.reconcile_inventory(raw).await {
                Ok(message) => tally.success(message),
                Err(e) => tally.failure("inventory", &key, &e),
            }
        }

        self.oplog.close(&mut record, tally).await?;
        Ok(record)
    }

    async fn reconcile_inventory(&self, raw: &Value) -> Result<String> {
        let draft = map_inbound_inventory(raw)?;

        let item = self
            .storage
            .find_item_by_sku(&draft.product_sku)
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!("product '{}' does not exist", draft.product_sku))
            })?;
        let store = self
            .storage
            .find_store_by_slug(&draft.store_slug)
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!("store '{}' does not exist", draft.store_slug))
            })?;

        let update = LevelUpdate {
            key: InventoryKey::new(store.id, item.id, draft.variant),
            quantity: draft.quantity,
            price: draft.price.unwrap_or(item.price),
            online_available: draft.online_available,
        };
        let outcome = self.reconciler.reconcile(&*self.storage, &update).await?;

        Ok(format!(
            "inventory {} - {} {}",
            store.name,
            item.sku,
            verb(outcome.created)
        ))
    }

    /// Posts every exportable order created inside `window`
    pub async fn export_orders(&self, window: ExportWindow) -> Result<OperationRecord> {
        let mut record = self
            .oplog
            .open(OperationKind::OrderExport, window_params(&window))
            .await?;

        let candidates = match self
            .storage
            .select_export_candidates(&OrderStatus::EXPORTABLE, &window)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                self.oplog.fail(&mut record, &e).await?;
                return Ok(record);
            }
        };

        let mut tally = BatchTally::new(candidates.len());
        for order in &candidates {
            match self.export_order(order).await {
                Ok(message) => tally.success(message),
                Err(e) => tally.failure("order", &order.order_number, &e),
            }
        }

        self.oplog.close(&mut record, tally).await?;
        Ok(record)
    }

    async fn export_order(&self, order: &OrderExportCandidate) -> Result<String> {
        let body = map_outbound_order(order)?;
        let response = self
            .client
            .execute(Method::POST, ORDERS_PATH, Some(&body))
            .await?;

        let ack = OrderAck::from_response(response);
        if !ack.success {
            return Err(SyncError::Other("rejected by external system".to_string()));
        }

        let receipt = ExportReceipt {
            order_id: order.id,
            order_number: order.order_number.clone(),
            external_id: ack.external_id(),
            exported_at: Utc::now(),
        };
        self.storage.record_export_receipt(&receipt).await?;

        Ok(match receipt.external_id {
            Some(external_id) => format!(
                "order {} exported (external id {external_id})",
                order.order_number
            ),
            None => format!("order {} exported", order.order_number),
        })
    }

    async fn fetch(&self, path: &str, envelope: &str) -> Result<Vec<Value>> {
        let response = self.client.execute(Method::GET, path, None).await?;
        let batch = envelope_records(response, envelope)?;
        tracing::debug!(
            system = self.client.system_name(),
            path,
            records = batch.len(),
            "Fetched external batch"
        );
        Ok(batch)
    }
}

fn verb(created: bool) -> &'static str {
    if created {
        "created"
    } else {
        "updated"
    }
}

/// Natural key of a raw record for messages, `N/A` when absent
fn record_key(raw: &Value, field: &str) -> String {
    match raw.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "N/A".to_string(),
    }
}
