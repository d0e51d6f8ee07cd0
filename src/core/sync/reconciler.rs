//! Inventory reconciliation
//!
//! Turns "the external system says this level is now N" into a level write
//! plus, when the quantity changes, a ledger movement. Folding the movements
//! of a key from zero always yields the stored quantity.

use crate::adapters::database::InventoryStorage;
use crate::domain::{InventoryKey, InventoryLevel, InventoryMovement, MovementKind, Result, SyncError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// How many times a compare-and-set conflict is re-planned before giving up
const MAX_CONFLICT_RETRIES: usize = 2;

/// Incoming state of one inventory level after mapping and key resolution
#[derive(Debug, Clone, PartialEq)]
pub struct LevelUpdate {
    pub key: InventoryKey,
    pub quantity: i64,
    pub price: Decimal,
    pub online_available: bool,
}

/// What to write for one level, decided before any write happens
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan {
    pub key: InventoryKey,
    /// Stored quantity the plan was computed against; `None` if the level is new
    pub expected_previous: Option<i64>,
    /// Full level row after the write
    pub level: InventoryLevel,
    /// Ledger entry written before the level, if the quantity moved
    pub movement: Option<InventoryMovement>,
}

impl ReconciliationPlan {
    pub fn is_creation(&self) -> bool {
        self.expected_previous.is_none()
    }
}

/// Result of applying a plan
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub created: bool,
    pub level: InventoryLevel,
    pub movement: Option<InventoryMovement>,
}

#[derive(Debug, Clone)]
pub struct InventoryReconciler {
    reference: String,
    record_opening_balance: bool,
}

impl InventoryReconciler {
    /// # Arguments
    ///
    /// * `reference` - Reference id stamped on every movement
    /// * `record_opening_balance` - Emit a restock movement when a level is
    ///   created with a non-zero quantity
    pub fn new(reference: impl Into<String>, record_opening_balance: bool) -> Self {
        Self {
            reference: reference.into(),
            record_opening_balance,
        }
    }

    /// Pure planning step
    ///
    /// - existing level, different quantity: `adjustment` of `new - old`
    /// - existing level, same quantity: no movement
    /// - new level: a `restock` opening balance if enabled and non-zero, else nothing
    pub fn plan(
        &self,
        existing: Option<&InventoryLevel>,
        update: &LevelUpdate,
        now: DateTime<Utc>,
    ) -> ReconciliationPlan {
        let level = InventoryLevel {
            key: update.key.clone(),
            quantity: update.quantity,
            reserved: existing.map_or(0, |l| l.reserved),
            price: update.price,
            online_available: update.online_available,
            last_restocked: Some(now),
            updated_at: now,
        };

        let movement = match existing {
            Some(current) if current.quantity != update.quantity => Some(self.movement(
                update,
                MovementKind::Adjustment,
                update.quantity - current.quantity,
                now,
            )),
            Some(_) => None,
            None if self.record_opening_balance && update.quantity != 0 => Some(self.movement(
                update,
                MovementKind::Restock,
                update.quantity,
                now,
            )),
            None => None,
        };

        ReconciliationPlan {
            key: update.key.clone(),
            expected_previous: existing.map(|l| l.quantity),
            level,
            movement,
        }
    }

    fn movement(
        &self,
        update: &LevelUpdate,
        kind: MovementKind,
        delta: i64,
        now: DateTime<Utc>,
    ) -> InventoryMovement {
        let notes = match kind {
            MovementKind::Restock => "Opening balance from external sync",
            _ => "Automatic sync from external system",
        };
        InventoryMovement {
            id: Uuid::new_v4(),
            key: update.key.clone(),
            kind,
            delta,
            resulting_quantity: update.quantity,
            reference_id: self.reference.clone(),
            notes: notes.to_string(),
            actor: None,
            created_at: now,
        }
    }

    /// Reads the current level, plans, and applies the plan atomically
    ///
    /// A concurrent writer changing the level between read and write is
    /// detected by the storage compare-and-set; the plan is then recomputed
    /// against the fresh row.
    ///
    /// # Errors
    ///
    /// Storage errors, or [`SyncError::Conflict`] if the level keeps changing.
    pub async fn reconcile<S>(&self, storage: &S, update: &LevelUpdate) -> Result<Reconciled>
    where
        S: InventoryStorage + ?Sized,
    {
        let mut attempt = 0;
        loop {
            let existing = storage.get_level(&update.key).await?;
            let plan = self.plan(existing.as_ref(), update, Utc::now());

            match storage.apply_reconciliation(&plan).await {
                Ok(()) => {
                    if let Some(ref movement) = plan.movement {
                        tracing::debug!(
                            key = %plan.key,
                            kind = %movement.kind,
                            delta = movement.delta,
                            resulting = movement.resulting_quantity,
                            "Inventory movement recorded"
                        );
                    }
                    return Ok(Reconciled {
                        created: plan.is_creation(),
                        level: plan.level,
                        movement: plan.movement,
                    });
                }
                Err(SyncError::Conflict(reason)) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(key = %update.key, attempt, reason = %reason, "Re-planning after conflict");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStorage;
    use crate::domain::{ItemId, Store, StoreId};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn key() -> InventoryKey {
        InventoryKey::new(StoreId::new(), ItemId::new(), None)
    }

    fn update(key: &InventoryKey, quantity: i64) -> LevelUpdate {
        LevelUpdate {
            key: key.clone(),
            quantity,
            price: Decimal::new(12000, 2),
            online_available: true,
        }
    }

    fn level(key: &InventoryKey, quantity: i64) -> InventoryLevel {
        InventoryLevel {
            key: key.clone(),
            quantity,
            reserved: 2,
            price: Decimal::new(10000, 2),
            online_available: false,
            last_restocked: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_adjustment_on_change() {
        let reconciler = InventoryReconciler::new("external_sync", true);
        let key = key();
        let plan = reconciler.plan(Some(&level(&key, 10)), &update(&key, 7), Utc::now());

        let movement = plan.movement.unwrap();
        assert_eq!(movement.kind, MovementKind::Adjustment);
        assert_eq!(movement.delta, -3);
        assert_eq!(movement.resulting_quantity, 7);
        assert_eq!(movement.reference_id, "external_sync");
        assert_eq!(plan.expected_previous, Some(10));
        assert_eq!(plan.level.quantity, 7);
        assert_eq!(plan.level.reserved, 2);
    }

    #[test]
    fn test_plan_no_movement_when_unchanged() {
        let reconciler = InventoryReconciler::new("external_sync", true);
        let key = key();
        let plan = reconciler.plan(Some(&level(&key, 5)), &update(&key, 5), Utc::now());
        assert!(plan.movement.is_none());
        assert!(plan.level.online_available);
    }

    #[test]
    fn test_plan_opening_balance_on_creation() {
        let reconciler = InventoryReconciler::new("external_sync", true);
        let key = key();
        let plan = reconciler.plan(None, &update(&key, 4), Utc::now());

        assert!(plan.is_creation());
        let movement = plan.movement.unwrap();
        assert_eq!(movement.kind, MovementKind::Restock);
        assert_eq!(movement.delta, 4);
    }

    #[test]
    fn test_plan_creation_without_opening_balance() {
        let reconciler = InventoryReconciler::new("external_sync", false);
        let key = key();
        let plan = reconciler.plan(None, &update(&key, 4), Utc::now());
        assert!(plan.movement.is_none());
        assert_eq!(plan.level.reserved, 0);
    }

    #[test]
    fn test_plan_zero_quantity_creation_has_no_movement() {
        let reconciler = InventoryReconciler::new("external_sync", true);
        let key = key();
        assert!(reconciler.plan(None, &update(&key, 0), Utc::now()).movement.is_none());
    }

    /// Storage where another writer moves the level right before each write
    struct RacingStorage {
        inner: MemoryStorage,
        /// Quantities the other writer sets, one per intercepted write
        interference: Mutex<VecDeque<i64>>,
    }

    impl RacingStorage {
        fn new(interference: &[i64]) -> Self {
            Self {
                inner: MemoryStorage::new(),
                interference: Mutex::new(interference.iter().copied().collect()),
            }
        }

        async fn other_writer_sets(&self, key: &InventoryKey, quantity: i64) {
            let existing = self.inner.get_level(key).await.unwrap();
            let plan = InventoryReconciler::new("pos-sale", false).plan(
                existing.as_ref(),
                &update(key, quantity),
                Utc::now(),
            );
            self.inner.apply_reconciliation(&plan).await.unwrap();
        }
    }

    #[async_trait]
    impl InventoryStorage for RacingStorage {
        async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>> {
            self.inner.find_store_by_slug(slug).await
        }

        async fn get_level(&self, key: &InventoryKey) -> Result<Option<InventoryLevel>> {
            self.inner.get_level(key).await
        }

        async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<()> {
            let next = self.interference.lock().unwrap().pop_front();
            if let Some(quantity) = next {
                self.other_writer_sets(&plan.key, quantity).await;
            }
            self.inner.apply_reconciliation(plan).await
        }

        async fn list_movements(&self, key: &InventoryKey) -> Result<Vec<InventoryMovement>> {
            self.inner.list_movements(key).await
        }
    }

    fn replay(movements: &[InventoryMovement]) -> i64 {
        movements.iter().map(|m| m.delta).sum()
    }

    #[tokio::test]
    async fn test_reconcile_replans_against_concurrent_write() {
        let storage = RacingStorage::new(&[]);
        let reconciler = InventoryReconciler::new("external_sync", true);
        let key = key();
        reconciler.reconcile(&storage, &update(&key, 10)).await.unwrap();

        // A sale takes the level to 8 while we are syncing it to 7
        storage.interference.lock().unwrap().push_back(8);
        let reconciled = reconciler.reconcile(&storage, &update(&key, 7)).await.unwrap();

        let movement = reconciled.movement.unwrap();
        assert_eq!(movement.kind, MovementKind::Adjustment);
        assert_eq!(movement.delta, -1);
        assert_eq!(movement.resulting_quantity, 7);

        let movements = storage.list_movements(&key).await.unwrap();
        let ours: Vec<_> = movements
            .iter()
            .filter(|m| m.reference_id == "external_sync" && m.kind == MovementKind::Adjustment)
            .collect();
        assert_eq!(ours.len(), 1);
        assert_eq!(ours[0].delta, -1);
        assert_eq!(replay(&movements), 7);
        assert_eq!(storage.get_level(&key).await.unwrap().unwrap().quantity, 7);
    }

    #[tokio::test]
    async fn test_reconcile_gives_up_when_level_keeps_moving() {
        let storage = RacingStorage::new(&[]);
        let reconciler = InventoryReconciler::new("external_sync", true);
        let key = key();
        reconciler.reconcile(&storage, &update(&key, 10)).await.unwrap();

        storage
            .interference
            .lock()
            .unwrap()
            .extend([9, 8, 6]);
        let err = reconciler.reconcile(&storage, &update(&key, 7)).await.unwrap_err();

        assert!(matches!(err, SyncError::Conflict(_)));
        // Nothing of ours was written; the ledger still replays to the level
        let movements = storage.list_movements(&key).await.unwrap();
        assert!(movements
            .iter()
            .all(|m| m.reference_id != "external_sync" || m.kind == MovementKind::Restock));
        assert_eq!(replay(&movements), 6);
        assert_eq!(storage.get_level(&key).await.unwrap().unwrap().quantity, 6);
    }
}
