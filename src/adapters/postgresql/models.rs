//! Row conversions for the PostgreSQL schema
//!
//! Enums are stored as their snake_case text; counters as BIGINT; the "no
//! variant" inventory key as the empty string.

use crate::core::scheduler::task::{SyncTask, TaskStatus};
use crate::domain::order::{Address, Customer, OrderLine};
use crate::domain::{
    CatalogItem, ExportReceipt, InventoryKey, InventoryLevel, InventoryMovement, ItemId,
    OperationId, OperationRecord, OrderExportCandidate, OrderId, Result, Sku, Store, StoreId,
    SyncError, TaskId, Taxon, TaxonId,
};
use serde_json::Value;
use std::str::FromStr;
use tokio_postgres::types::FromSql;
use tokio_postgres::Row;
use uuid::Uuid;

/// Typed column read with a domain error
pub fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T> {
    row.try_get(name)
        .map_err(|e| SyncError::Database(format!("Failed to read column '{name}': {e}")))
}

fn parse_text<T>(row: &Row, name: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = column(row, name)?;
    T::from_str(&text).map_err(SyncError::Database)
}

fn counter(row: &Row, name: &str) -> Result<u64> {
    let value: i64 = column(row, name)?;
    u64::try_from(value).map_err(|_| SyncError::Database(format!("Negative counter in '{name}'")))
}

/// Storage form of an optional variant
pub fn variant_column(variant: &Option<String>) -> &str {
    variant.as_deref().unwrap_or("")
}

fn variant_from_column(row: &Row) -> Result<Option<String>> {
    let variant: String = column(row, "variant")?;
    Ok((!variant.is_empty()).then_some(variant))
}

/// Saturating conversion for counters written to BIGINT
pub fn to_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub fn taxon_from_row(row: &Row) -> Result<Taxon> {
    Ok(Taxon {
        id: TaxonId::from_uuid(column(row, "id")?),
        kind: parse_text(row, "kind")?,
        name: column(row, "name")?,
        slug: column(row, "slug")?,
    })
}

pub fn item_from_row(row: &Row) -> Result<CatalogItem> {
    let attributes: Value = column(row, "attributes")?;
    let sku: String = column(row, "sku")?;

    Ok(CatalogItem {
        id: ItemId::from_uuid(column(row, "id")?),
        sku: Sku::new(sku).map_err(SyncError::Database)?,
        name: column(row, "name")?,
        slug: column(row, "slug")?,
        description: column(row, "description")?,
        short_description: column(row, "short_description")?,
        category_id: TaxonId::from_uuid(column(row, "category_id")?),
        brand_id: TaxonId::from_uuid(column(row, "brand_id")?),
        price: column(row, "price")?,
        cost_price: column(row, "cost_price")?,
        attributes: match attributes {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        },
        active: column(row, "active")?,
        weight: column(row, "weight")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub fn store_from_row(row: &Row) -> Result<Store> {
    Ok(Store {
        id: StoreId::from_uuid(column(row, "id")?),
        slug: column(row, "slug")?,
        name: column(row, "name")?,
    })
}

fn key_from_row(row: &Row) -> Result<InventoryKey> {
    Ok(InventoryKey::new(
        StoreId::from_uuid(column(row, "store_id")?),
        ItemId::from_uuid(column(row, "item_id")?),
        variant_from_column(row)?,
    ))
}

pub fn level_from_row(row: &Row) -> Result<InventoryLevel> {
    Ok(InventoryLevel {
        key: key_from_row(row)?,
        quantity: column(row, "quantity")?,
        reserved: column(row, "reserved")?,
        price: column(row, "price")?,
        online_available: column(row, "online_available")?,
        last_restocked: column(row, "last_restocked")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub fn movement_from_row(row: &Row) -> Result<InventoryMovement> {
    Ok(InventoryMovement {
        id: column::<Uuid>(row, "id")?,
        key: key_from_row(row)?,
        kind: parse_text(row, "kind")?,
        delta: column(row, "delta")?,
        resulting_quantity: column(row, "resulting_quantity")?,
        reference_id: column(row, "reference_id")?,
        notes: column(row, "notes")?,
        actor: column(row, "actor")?,
        created_at: column(row, "created_at")?,
    })
}

/// Order header without lines; lines are attached by the adapter
pub fn order_from_row(row: &Row) -> Result<OrderExportCandidate> {
    let billing: Option<Value> = column(row, "billing_address")?;
    let billing_address = billing
        .filter(|v| !v.is_null())
        .map(serde_json::from_value::<Address>)
        .transpose()
        .map_err(|e| SyncError::Database(format!("Malformed billing address: {e}")))?;

    Ok(OrderExportCandidate {
        id: OrderId::from_uuid(column(row, "id")?),
        order_number: column(row, "order_number")?,
        customer: Customer {
            email: column(row, "customer_email")?,
            first_name: column(row, "customer_first_name")?,
            last_name: column(row, "customer_last_name")?,
            phone: column(row, "customer_phone")?,
        },
        store_code: column(row, "store_code")?,
        status: parse_text(row, "status")?,
        fulfillment_method: column(row, "fulfillment_method")?,
        billing_address,
        items: Vec::new(),
        subtotal: column(row, "subtotal")?,
        tax_amount: column(row, "tax_amount")?,
        shipping_amount: column(row, "shipping_amount")?,
        total_amount: column(row, "total_amount")?,
        created_at: column(row, "created_at")?,
    })
}

pub fn order_line_from_row(row: &Row) -> Result<(OrderId, OrderLine)> {
    let sku: String = column(row, "sku")?;
    Ok((
        OrderId::from_uuid(column(row, "order_id")?),
        OrderLine {
            sku: Sku::new(sku).map_err(SyncError::Database)?,
            name: column(row, "name")?,
            quantity: column(row, "quantity")?,
            unit_price: column(row, "unit_price")?,
            total_price: column(row, "total_price")?,
            customizations: column(row, "customizations")?,
        },
    ))
}

pub fn receipt_from_row(row: &Row) -> Result<ExportReceipt> {
    Ok(ExportReceipt {
        order_id: OrderId::from_uuid(column(row, "order_id")?),
        order_number: column(row, "order_number")?,
        external_id: column(row, "external_id")?,
        exported_at: column(row, "exported_at")?,
    })
}

pub fn operation_from_row(row: &Row) -> Result<OperationRecord> {
    let parameters: Value = column(row, "parameters")?;
    let messages: Value = column(row, "messages")?;

    Ok(OperationRecord {
        id: OperationId::from_uuid(column(row, "id")?),
        kind: parse_text(row, "kind")?,
        status: parse_text(row, "status")?,
        parameters: serde_json::from_value(parameters)?,
        processed: counter(row, "processed")?,
        succeeded: counter(row, "succeeded")?,
        failed: counter(row, "failed")?,
        messages: serde_json::from_value(messages)?,
        error_details: column(row, "error_details")?,
        started_at: column(row, "started_at")?,
        completed_at: column(row, "completed_at")?,
        created_at: column(row, "created_at")?,
    })
}

pub fn task_from_row(row: &Row) -> Result<SyncTask> {
    let parameters: Value = column(row, "parameters")?;
    let attempts: i32 = column(row, "attempts")?;
    let max_attempts: i32 = column(row, "max_attempts")?;
    let operation_ids: Vec<Uuid> = column(row, "operation_ids")?;

    Ok(SyncTask {
        id: TaskId::from_uuid(column(row, "id")?),
        kind: parse_text(row, "kind")?,
        parameters: serde_json::from_value(parameters)?,
        status: parse_text::<TaskStatus>(row, "status")?,
        attempts: u32::try_from(attempts).unwrap_or(0),
        max_attempts: u32::try_from(max_attempts).unwrap_or(1),
        next_eligible_at: column(row, "next_eligible_at")?,
        last_error: column(row, "last_error")?,
        operation_ids: operation_ids.into_iter().map(OperationId::from_uuid).collect(),
        claimed_by: column(row, "claimed_by")?,
        claimed_at: column(row, "claimed_at")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}
