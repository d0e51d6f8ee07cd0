//! Typed field readers over raw external JSON records
//!
//! Missing or null optional fields fall back to a default; a field that is
//! present with the wrong type is a mapping error.

use crate::domain::{Result, SyncError};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

fn field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    match record.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value),
    }
}

fn mapping_error(name: &str, expected: &str, got: &Value) -> SyncError {
    SyncError::Mapping(format!("field '{name}' must be {expected}, got {got}"))
}

/// Required, non-blank text; numbers are accepted and rendered as text
pub fn required_text(record: &Value, name: &str) -> Result<String> {
    let text = optional_text(record, name)?;
    if text.trim().is_empty() {
        return Err(SyncError::Mapping(format!("missing required field '{name}'")));
    }
    Ok(text)
}

/// Optional text, empty when absent
pub fn optional_text(record: &Value, name: &str) -> Result<String> {
    match field(record, name) {
        None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(mapping_error(name, "a string", other)),
    }
}

/// Optional text with a fallback for absent or blank values
pub fn text_or(record: &Value, name: &str, fallback: &str) -> Result<String> {
    let text = optional_text(record, name)?;
    if text.trim().is_empty() {
        Ok(fallback.to_string())
    } else {
        Ok(text)
    }
}

/// Decimal from a JSON number or a numeric string
pub fn optional_decimal(record: &Value, name: &str) -> Result<Option<Decimal>> {
    let raw = match field(record, name) {
        None => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => return Err(mapping_error(name, "a decimal", other)),
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| SyncError::Mapping(format!("field '{name}' is not a valid decimal: {raw}")))
}

pub fn decimal_or_zero(record: &Value, name: &str) -> Result<Decimal> {
    Ok(optional_decimal(record, name)?.unwrap_or(Decimal::ZERO))
}

pub fn bool_or(record: &Value, name: &str, default: bool) -> Result<bool> {
    match field(record, name) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(mapping_error(name, "a boolean", other)),
    }
}

/// Non-negative whole number, zero when absent
pub fn non_negative_integer(record: &Value, name: &str) -> Result<i64> {
    let value = match field(record, name) {
        None => return Ok(0),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    match value {
        Some(v) if v >= 0 => Ok(v),
        Some(v) => Err(SyncError::Mapping(format!(
            "field '{name}' cannot be negative, got {v}"
        ))),
        None => Err(mapping_error(
            name,
            "a whole number",
            record.get(name).unwrap_or(&Value::Null),
        )),
    }
}

/// JSON object, empty when absent
pub fn object_or_empty(record: &Value, name: &str) -> Result<Map<String, Value>> {
    match field(record, name) {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(mapping_error(name, "an object", other)),
    }
}
