//! Inventory entities: stores, per-store stock levels and the movement ledger

use crate::domain::ids::{ItemId, Sku, StoreId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A physical or online store holding stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub slug: String,
    pub name: String,
}

/// Composite key of an inventory level
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryKey {
    pub store_id: StoreId,
    pub item_id: ItemId,
    pub variant: Option<String>,
}

impl InventoryKey {
    pub fn new(store_id: StoreId, item_id: ItemId, variant: Option<String>) -> Self {
        Self {
            store_id,
            item_id,
            variant,
        }
    }
}

impl fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{}/{}", self.store_id, self.item_id, variant),
            None => write!(f, "{}/{}", self.store_id, self.item_id),
        }
    }
}

/// Stock on hand for one (store, item, variant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub key: InventoryKey,
    pub quantity: i64,
    pub reserved: i64,
    pub price: Decimal,
    pub online_available: bool,
    pub last_restocked: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryLevel {
    /// Quantity that can still be sold; always derived, never stored
    ///
    /// # Examples
    ///
    /// ```
    /// # use catalog_sync::domain::inventory::{InventoryKey, InventoryLevel};
    /// # use catalog_sync::domain::ids::{ItemId, StoreId};
    /// # use rust_decimal::Decimal;
    /// # use chrono::Utc;
    /// let level = InventoryLevel {
    ///     key: InventoryKey::new(StoreId::new(), ItemId::new(), None),
    ///     quantity: 3,
    ///     reserved: 5,
    ///     price: Decimal::ZERO,
    ///     online_available: true,
    ///     last_restocked: None,
    ///     updated_at: Utc::now(),
    /// };
    /// assert_eq!(level.available(), 0);
    /// ```
    pub fn available(&self) -> i64 {
        (self.quantity - self.reserved).max(0)
    }
}

/// Cause of a stock change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Restock,
    Sale,
    Return,
    Adjustment,
    Transfer,
    Damage,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Restock => "restock",
            MovementKind::Sale => "sale",
            MovementKind::Return => "return",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Transfer => "transfer",
            MovementKind::Damage => "damage",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restock" => Ok(MovementKind::Restock),
            "sale" => Ok(MovementKind::Sale),
            "return" => Ok(MovementKind::Return),
            "adjustment" => Ok(MovementKind::Adjustment),
            "transfer" => Ok(MovementKind::Transfer),
            "damage" => Ok(MovementKind::Damage),
            other => Err(format!("Unknown movement kind: {other}")),
        }
    }
}

/// Immutable, append-only audit row for one quantity change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub key: InventoryKey,
    pub kind: MovementKind,
    pub delta: i64,
    pub resulting_quantity: i64,
    pub reference_id: String,
    pub notes: String,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Folds movement deltas from zero in creation order
///
/// For any key this must equal the stored level quantity.
pub fn replay_quantity(movements: &[InventoryMovement]) -> i64 {
    let mut ordered: Vec<&InventoryMovement> = movements.iter().collect();
    ordered.sort_by_key(|m| m.created_at);
    ordered.iter().map(|m| m.delta).sum()
}

/// Output of the inbound inventory mapper
///
/// Store and item are still external keys; the orchestrator resolves them.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryDraft {
    pub product_sku: Sku,
    pub store_slug: String,
    pub variant: Option<String>,
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub online_available: bool,
}
