//! Domain-facing types for the ordering backend.
//!
//! Wire records deserialize from the GraphQL response shapes (camelCase
//! fields, decimal amounts as strings) and convert into the core domain
//! types the checkout engine works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medcart_core::cart::{OrderMode, ProductPricing, RemoteCartLine};
use medcart_core::tier::{TierRule, TierSchedule};
use medcart_core::types::{
    CartItemId, CustomerId, Money, OrderId, OrderStatus, ProductId, RequestId, RequestStatus,
    VariantId,
};

use super::OrdersError;

/// Cursor-paginated result page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// One row of the order history listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    /// Short human-facing order number (e.g. `#1042`).
    pub display_id: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub total_price: Money,
    pub line_count: u32,
}

/// One row of the product/prescription request listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub id: RequestId,
    pub product_name: String,
    pub patient_name: String,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
}

/// The order the session submits once checkout completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub mode: OrderMode,
    /// Required for customer orders, absent for clinic/house orders.
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<OrderDraftLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraftLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
}

// =============================================================================
// Wire records
// =============================================================================

/// A shared-cart item as the backend returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRecord {
    pub id: CartItemId,
    pub quantity: u32,
    /// Decimal amount as a string, e.g. `"12.50"`.
    pub unit_price: String,
    pub product: CartItemProduct,
    pub variant: CartItemVariant,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemProduct {
    pub id: ProductId,
    pub name: String,
    pub base_price: String,
    pub custom_price: Option<String>,
    pub has_price_history: bool,
    pub latest_marked_up_price: Option<String>,
    pub has_tier_pricing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemVariant {
    pub id: VariantId,
}

/// A tier rule as the backend returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRuleRecord {
    pub start_count: u32,
    pub end_count: Option<u32>,
    pub tiered_price: String,
}

fn parse_money(raw: &str, field: &str) -> Result<Money, OrdersError> {
    raw.parse()
        .map_err(|_| OrdersError::InvalidData(format!("{field}: bad amount {raw:?}")))
}

fn parse_optional_money(raw: Option<&str>, field: &str) -> Result<Option<Money>, OrdersError> {
    raw.map(|value| parse_money(value, field)).transpose()
}

impl CartItemRecord {
    /// Convert into the core reconciler's input shape.
    ///
    /// # Errors
    ///
    /// [`OrdersError::InvalidData`] when an amount fails to parse.
    pub fn into_remote_line(self) -> Result<RemoteCartLine, OrdersError> {
        let pricing = ProductPricing {
            base_price: parse_money(&self.product.base_price, "basePrice")?,
            custom_price: parse_optional_money(self.product.custom_price.as_deref(), "customPrice")?,
            has_price_history: self.product.has_price_history,
            latest_marked_up_price: parse_optional_money(
                self.product.latest_marked_up_price.as_deref(),
                "latestMarkedUpPrice",
            )?,
        };
        Ok(RemoteCartLine {
            cart_item_id: self.id,
            product_id: self.product.id,
            variant_id: self.variant.id,
            name: self.product.name,
            quantity: self.quantity,
            unit_price: parse_money(&self.unit_price, "unitPrice")?,
            has_tier_pricing: self.product.has_tier_pricing,
            pricing,
        })
    }
}

/// Convert backend tier rule records into a validated schedule.
///
/// # Errors
///
/// [`OrdersError::InvalidData`] for unparseable amounts or a malformed
/// (overlapping/inverted) rule set.
pub fn into_tier_schedule(records: Vec<TierRuleRecord>) -> Result<TierSchedule, OrdersError> {
    let rules = records
        .into_iter()
        .map(|record| {
            Ok(TierRule {
                start_count: record.start_count,
                end_count: record.end_count,
                tiered_price: parse_money(&record.tiered_price, "tieredPrice")?,
            })
        })
        .collect::<Result<Vec<_>, OrdersError>>()?;
    TierSchedule::new(rules).map_err(|e| OrdersError::InvalidData(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_item_record_converts() {
        let record: CartItemRecord = serde_json::from_value(serde_json::json!({
            "id": "ci_1",
            "quantity": 2,
            "unitPrice": "60.00",
            "product": {
                "id": "prod_1",
                "name": "Vitamin D3",
                "basePrice": "50.00",
                "customPrice": "75.00",
                "hasPriceHistory": true,
                "latestMarkedUpPrice": "75.00",
                "hasTierPricing": false
            },
            "variant": { "id": "var_1" }
        }))
        .unwrap();

        let line = record.into_remote_line().unwrap();
        assert_eq!(line.product_id, ProductId::new("prod_1"));
        assert_eq!(line.unit_price, Money::from_cents(6000));
        assert_eq!(
            line.pricing.latest_marked_up_price,
            Some(Money::from_cents(7500))
        );
        assert!(line.pricing.is_marked_up());
    }

    #[test]
    fn test_bad_amount_is_invalid_data() {
        let record: CartItemRecord = serde_json::from_value(serde_json::json!({
            "id": "ci_1",
            "quantity": 2,
            "unitPrice": "sixty",
            "product": {
                "id": "prod_1",
                "name": "Vitamin D3",
                "basePrice": "50.00",
                "customPrice": null,
                "hasPriceHistory": false,
                "latestMarkedUpPrice": null,
                "hasTierPricing": false
            },
            "variant": { "id": "var_1" }
        }))
        .unwrap();

        let err = record.into_remote_line().unwrap_err();
        assert!(matches!(err, OrdersError::InvalidData(_)));
    }

    #[test]
    fn test_tier_schedule_conversion() {
        let schedule = into_tier_schedule(vec![
            TierRuleRecord {
                start_count: 5,
                end_count: None,
                tiered_price: "8.00".to_string(),
            },
            TierRuleRecord {
                start_count: 1,
                end_count: Some(4),
                tiered_price: "10.00".to_string(),
            },
        ])
        .unwrap();
        assert_eq!(schedule.price_for(5), Some(Money::from_cents(800)));
    }

    #[test]
    fn test_order_summary_wire_shape() {
        let summary: OrderSummary = serde_json::from_value(serde_json::json!({
            "id": "ord_9",
            "displayId": "#1042",
            "status": "PAID",
            "createdAt": "2025-11-02T17:40:00Z",
            "totalPrice": "108.75",
            "lineCount": 3
        }))
        .unwrap();
        assert_eq!(summary.status, OrderStatus::Paid);
        assert_eq!(summary.total_price, Money::from_cents(10875));
    }
}
