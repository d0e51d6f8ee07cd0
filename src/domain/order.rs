//! Read view over orders that can be exported to the external system

use crate::domain::ids::{OrderId, Sku};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Order lifecycle status
///
/// The lifecycle itself is owned elsewhere; this subsystem only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Pending,
    Confirmed,
    Processing,
    Ready,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Statuses that make an order eligible for export
    pub const EXPORTABLE: [OrderStatus; 2] = [OrderStatus::Confirmed, OrderStatus::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn is_exportable(&self) -> bool {
        Self::EXPORTABLE.contains(self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(OrderStatus::Draft),
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "ready" => Ok(OrderStatus::Ready),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(format!("Unknown order status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: Sku,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub customizations: Value,
}

/// An order in an exportable status with its lines and addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExportCandidate {
    pub id: OrderId,
    pub order_number: String,
    pub customer: Customer,
    pub store_code: String,
    pub status: OrderStatus,
    pub fulfillment_method: String,
    pub billing_address: Option<Address>,
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Half-open `[date_from, date_to)` window on order creation time, UTC dates
///
/// Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportWindow {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ExportWindow {
    pub fn new(date_from: Option<NaiveDate>, date_to: Option<NaiveDate>) -> Result<Self, String> {
        if let (Some(from), Some(to)) = (date_from, date_to) {
            if from >= to {
                return Err(format!(
                    "date_from ({from}) must be strictly before date_to ({to})"
                ));
            }
        }
        Ok(Self { date_from, date_to })
    }

    /// The previous calendar day relative to `today`: `[today - 1, today)`
    pub fn previous_day(today: NaiveDate) -> Self {
        Self {
            date_from: today.pred_opt(),
            date_to: Some(today),
        }
    }

    /// Lower bound as an instant (UTC midnight)
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.date_from.and_then(midnight_utc)
    }

    /// Exclusive upper bound as an instant (UTC midnight)
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.date_to.and_then(midnight_utc)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start().map_or(true, |start| at >= start) && self.end().map_or(true, |end| at < end)
    }
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Acknowledgement that the external system accepted an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReceipt {
    pub order_id: OrderId,
    pub order_number: String,
    pub external_id: Option<String>,
    pub exported_at: DateTime<Utc>,
}
