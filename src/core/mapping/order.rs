//! Outbound order mapping

use crate::adapters::external::models::{
    ExternalAddress, ExternalCustomer, ExternalOrder, ExternalOrderItem, ExternalTotals,
};
use crate::domain::{OrderExportCandidate, Result, SyncError};
use serde_json::Value;

/// Builds the `POST /api/orders` body for one order
///
/// # Errors
///
/// [`SyncError::Mapping`] if the order has no billing address.
pub fn map_outbound_order(order: &OrderExportCandidate) -> Result<Value> {
    let billing = order.billing_address.as_ref().ok_or_else(|| {
        SyncError::Mapping(format!("order {} has no billing address", order.order_number))
    })?;

    let body = ExternalOrder {
        order_number: order.order_number.clone(),
        customer: ExternalCustomer {
            email: order.customer.email.clone(),
            first_name: order.customer.first_name.clone(),
            last_name: order.customer.last_name.clone(),
            phone: order.customer.phone.clone(),
        },
        store_code: order.store_code.clone(),
        status: order.status.as_str().to_string(),
        fulfillment_method: order.fulfillment_method.clone(),
        billing_address: ExternalAddress {
            first_name: billing.first_name.clone(),
            last_name: billing.last_name.clone(),
            address: billing.address_line.clone(),
            city: billing.city.clone(),
            postal_code: billing.postal_code.clone(),
            phone: billing.phone.clone(),
        },
        items: order
            .items
            .iter()
            .map(|line| ExternalOrderItem {
                sku: line.sku.to_string(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price.to_string(),
                total_price: line.total_price.to_string(),
                customizations: line.customizations.clone(),
            })
            .collect(),
        totals: ExternalTotals {
            subtotal: order.subtotal.to_string(),
            tax_amount: order.tax_amount.to_string(),
            shipping_amount: order.shipping_amount.to_string(),
            total_amount: order.total_amount.to_string(),
        },
        created_at: order.created_at.to_rfc3339(),
    };

    Ok(serde_json::to_value(body)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::order::{Address, Customer, OrderLine};
    use crate::domain::{OrderId, OrderStatus, Sku};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    /// A confirmed pickup order with one line and a billing address
    pub(crate) fn sample_order(order_number: &str) -> OrderExportCandidate {
        OrderExportCandidate {
            id: OrderId::new(),
            order_number: order_number.to_string(),
            customer: Customer {
                email: "giulia@example.com".to_string(),
                first_name: "Giulia".to_string(),
                last_name: "Rossi".to_string(),
                phone: "+39 02 1234".to_string(),
            },
            store_code: "milano-centro".to_string(),
            status: OrderStatus::Confirmed,
            fulfillment_method: "pickup".to_string(),
            billing_address: Some(Address {
                first_name: "Giulia".to_string(),
                last_name: "Rossi".to_string(),
                address_line: "Via Roma 1".to_string(),
                city: "Milano".to_string(),
                postal_code: "20100".to_string(),
                phone: "+39 02 1234".to_string(),
            }),
            items: vec![OrderLine {
                sku: Sku::new("RAY-3025-58").unwrap(),
                name: "Aviator Classic".to_string(),
                quantity: 2,
                unit_price: Decimal::new(15900, 2),
                total_price: Decimal::new(31800, 2),
                customizations: json!({"engraving": "GR"}),
            }],
            subtotal: Decimal::new(31800, 2),
            tax_amount: Decimal::new(6996, 2),
            shipping_amount: Decimal::ZERO,
            total_amount: Decimal::new(38796, 2),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap(),
        }
    }

    fn order() -> OrderExportCandidate {
        sample_order("ORD-2025-0001")
    }

    #[test]
    fn test_map_outbound_order_shape() {
        let body = map_outbound_order(&order()).unwrap();

        assert_eq!(body["order_number"], "ORD-2025-0001");
        assert_eq!(body["customer"]["email"], "giulia@example.com");
        assert_eq!(body["store_code"], "milano-centro");
        assert_eq!(body["status"], "confirmed");
        assert_eq!(body["billing_address"]["address"], "Via Roma 1");
        assert_eq!(body["items"][0]["unit_price"], "159.00");
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["items"][0]["customizations"]["engraving"], "GR");
        assert_eq!(body["totals"]["total_amount"], "387.96");
        assert_eq!(body["totals"]["shipping_amount"], "0");
        assert_eq!(body["created_at"], "2025-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_missing_billing_address_is_mapping_error() {
        let mut order = order();
        order.billing_address = None;
        let err = map_outbound_order(&order).unwrap_err();
        assert!(matches!(err, SyncError::Mapping(_)));
        assert!(err.to_string().contains("ORD-2025-0001"));
    }
}
