//! Inbound product mapping

use super::fields::{
    bool_or, decimal_or_zero, object_or_empty, optional_decimal, optional_text, required_text,
    text_or,
};
use super::slug::slugify;
use crate::domain::{ProductDraft, Result, Sku, SyncError};
use serde_json::Value;

/// Names used when an external product has no category or brand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyDefaults {
    pub category: String,
    pub brand: String,
}

impl Default for TaxonomyDefaults {
    fn default() -> Self {
        Self {
            category: "Uncategorized".to_string(),
            brand: "Generic".to_string(),
        }
    }
}

/// Maps one external product record into a draft
///
/// `sku` and `name` are required. Everything else defaults: empty text,
/// zero prices, empty attributes, active.
///
/// # Errors
///
/// [`SyncError::Mapping`] for a missing required field or a field of the
/// wrong type.
pub fn map_inbound_product(record: &Value, defaults: &TaxonomyDefaults) -> Result<ProductDraft> {
    if !record.is_object() {
        return Err(SyncError::Mapping("product record is not an object".to_string()));
    }

    let sku = Sku::new(required_text(record, "sku")?).map_err(SyncError::Mapping)?;
    let name = required_text(record, "name")?;

    Ok(ProductDraft {
        slug: slugify(&name),
        sku,
        name,
        description: optional_text(record, "description")?,
        short_description: optional_text(record, "short_description")?,
        category_name: text_or(record, "category", &defaults.category)?,
        brand_name: text_or(record, "brand", &defaults.brand)?,
        price: decimal_or_zero(record, "price")?,
        cost_price: decimal_or_zero(record, "cost_price")?,
        attributes: object_or_empty(record, "attributes")?,
        active: bool_or(record, "active", true)?,
        weight: optional_decimal(record, "weight")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_full_record() {
        let record = json!({
            "sku": "RAY-3025-58",
            "name": "Aviator Classic",
            "category": "Occhiali da Sole",
            "brand": "Ray-Ban",
            "price": "159.00",
            "cost_price": 80,
            "description": "Metal frame",
            "attributes": {"lens": "G-15"},
            "active": false,
            "weight": 0.03
        });

        let draft = map_inbound_product(&record, &TaxonomyDefaults::default()).unwrap();
        assert_eq!(draft.sku.as_str(), "RAY-3025-58");
        assert_eq!(draft.slug, "aviator-classic");
        assert_eq!(draft.category_name, "Occhiali da Sole");
        assert_eq!(draft.price, Decimal::new(15900, 2));
        assert_eq!(draft.cost_price, Decimal::new(80, 0));
        assert_eq!(draft.attributes["lens"], "G-15");
        assert!(!draft.active);
        assert_eq!(draft.weight, Some(Decimal::new(3, 2)));
    }

    #[test]
    fn test_minimal_record_gets_defaults() {
        let draft = map_inbound_product(
            &json!({"sku": "X1", "name": "Case"}),
            &TaxonomyDefaults::default(),
        )
        .unwrap();

        assert_eq!(draft.category_name, "Uncategorized");
        assert_eq!(draft.brand_name, "Generic");
        assert_eq!(draft.price, Decimal::ZERO);
        assert!(draft.description.is_empty());
        assert!(draft.attributes.is_empty());
        assert!(draft.active);
        assert!(draft.weight.is_none());
    }

    #[test_case(json!({"name": "No sku"}) ; "missing sku")]
    #[test_case(json!({"sku": "A"}) ; "missing name")]
    #[test_case(json!({"sku": "A", "name": "B", "price": "free"}) ; "bad price")]
    #[test_case(json!({"sku": "A", "name": "B", "attributes": "x"}) ; "attributes not object")]
    #[test_case(json!({"sku": "A", "name": "B", "active": "yes"}) ; "active not bool")]
    #[test_case(json!(["A"]) ; "not an object")]
    fn test_malformed_records(record: Value) {
        let err = map_inbound_product(&record, &TaxonomyDefaults::default()).unwrap_err();
        assert!(matches!(err, SyncError::Mapping(_)));
    }
}
