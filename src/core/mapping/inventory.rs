//! Inbound inventory mapping

use super::fields::{bool_or, non_negative_integer, optional_decimal, optional_text, required_text};
use crate::domain::{InventoryDraft, Result, Sku, SyncError};
use serde_json::Value;

/// Maps one external inventory record
///
/// Store and product stay external keys here; resolving them is a storage
/// lookup done by the orchestrator.
///
/// # Errors
///
/// [`SyncError::Mapping`] when `product_sku` or `store_slug` is missing, or
/// when the quantity is negative or not a whole number.
pub fn map_inbound_inventory(record: &Value) -> Result<InventoryDraft> {
    if !record.is_object() {
        return Err(SyncError::Mapping("inventory record is not an object".to_string()));
    }

    let product_sku = Sku::new(required_text(record, "product_sku")?).map_err(SyncError::Mapping)?;
    let store_slug = required_text(record, "store_slug")?;
    let variant = optional_text(record, "variant")?;

    Ok(InventoryDraft {
        product_sku,
        store_slug,
        variant: if variant.trim().is_empty() {
            None
        } else {
            Some(variant)
        },
        quantity: non_negative_integer(record, "quantity")?,
        price: optional_decimal(record, "price")?,
        online_available: bool_or(record, "online_available", true)?,
    })
}
