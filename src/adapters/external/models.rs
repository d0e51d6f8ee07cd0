//! Wire shapes of the external system's API
//!
//! Inbound records stay as raw JSON until the mapper looks at them, so one
//! malformed record never fails the whole envelope.

use crate::domain::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PRODUCTS_PATH: &str = "/api/products";
pub const INVENTORY_PATH: &str = "/api/inventory";
pub const ORDERS_PATH: &str = "/api/orders";

/// Inventory path, with the optional store filter as a query parameter
pub fn inventory_path(store_id: Option<&str>) -> String {
    match store_id {
        Some(store_id) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("store_id", store_id)
                .finish();
            format!("{INVENTORY_PATH}?{query}")
        }
        None => INVENTORY_PATH.to_string(),
    }
}

/// Extracts the record list under `key` from a response envelope
///
/// A missing key (or a null body) is an empty batch. Anything other than an
/// array under the key means the response is not what the API promises.
pub fn envelope_records(response: Value, key: &str) -> Result<Vec<Value>, TransportError> {
    match response {
        Value::Null => Ok(Vec::new()),
        Value::Object(mut map) => match map.remove(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(records)) => Ok(records),
            Some(other) => Err(TransportError::InvalidResponse(format!(
                "'{key}' must be an array, got {}",
                json_type(&other)
            ))),
        },
        other => Err(TransportError::InvalidResponse(format!(
            "expected an object envelope, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Response to `POST /api/orders`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrderAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub order_id: Option<Value>,
}

impl OrderAck {
    /// Lenient decode: an unrecognized body counts as a rejection
    pub fn from_response(response: Value) -> Self {
        serde_json::from_value(response).unwrap_or_default()
    }

    /// External order id as text, whether it came back as a string or a number
    pub fn external_id(&self) -> Option<String> {
        match self.order_id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Body of `POST /api/orders`
///
/// Amounts are decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalOrder {
    pub order_number: String,
    pub customer: ExternalCustomer,
    pub store_code: String,
    pub status: String,
    pub fulfillment_method: String,
    pub billing_address: ExternalAddress,
    pub items: Vec<ExternalOrderItem>,
    pub totals: ExternalTotals,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalCustomer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalAddress {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalOrderItem {
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: String,
    pub total_price: String,
    pub customizations: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalTotals {
    pub subtotal: String,
    pub tax_amount: String,
    pub shipping_amount: String,
    pub total_amount: String,
}
