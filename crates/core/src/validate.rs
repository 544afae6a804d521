//! Per-line price validation.
//!
//! Customer orders bill patients, so an edited price must stay within the
//! band the doctor is allowed to charge: no lower than the list price, no
//! higher than the most recent marked-up price when one is known. Clinic
//! orders bill the practice at base/tiered pricing and skip both checks.
//!
//! Validation runs on every price or quantity edit for inline feedback, and
//! once more as the gate before order submission.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::{CartBook, CartLine, OrderMode};
use crate::types::{Money, ProductId};

/// A price rule violation on a single line.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// The edited price undercuts the list price.
    #[error("price {price} is below the original price {original_price}")]
    BelowOriginalPrice { price: Money, original_price: Money },

    /// The edited price exceeds the latest marked-up price.
    #[error("price {price} is above the marked-up price {ceiling}")]
    AboveMarkupCeiling { price: Money, ceiling: Money },
}

/// Validate one line under the given order mode.
///
/// # Errors
///
/// Customer mode only: [`ValidationError::BelowOriginalPrice`] or
/// [`ValidationError::AboveMarkupCeiling`]. Clinic mode always passes - its
/// prices are derived, not negotiated.
pub fn validate_line(line: &CartLine, mode: OrderMode) -> Result<(), ValidationError> {
    if mode == OrderMode::Clinic {
        return Ok(());
    }
    let price = line.effective_price();
    if price < line.original_price {
        return Err(ValidationError::BelowOriginalPrice {
            price,
            original_price: line.original_price,
        });
    }
    if let Some(ceiling) = line.latest_marked_up_price
        && price > ceiling
    {
        return Err(ValidationError::AboveMarkupCeiling { price, ceiling });
    }
    Ok(())
}

/// Validate every line of a cart, collecting per-line failures.
///
/// An empty result means the cart may be submitted.
#[must_use]
pub fn validate_cart(book: &CartBook) -> Vec<(ProductId, ValidationError)> {
    book.lines()
        .iter()
        .filter_map(|line| {
            validate_line(line, book.mode())
                .err()
                .map(|error| (line.product_id.clone(), error))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::{Edited, ProductPricing};
    use crate::types::VariantId;

    fn line(original: u64, ceiling: Option<u64>, price: u64) -> CartLine {
        CartLine {
            product_id: ProductId::new("p1"),
            variant_id: VariantId::new("v1"),
            name: "Magnesium".to_string(),
            quantity: Edited::new(1),
            unit_price: Edited::new(Money::from_cents(price)),
            original_price: Money::from_cents(original),
            latest_marked_up_price: ceiling.map(Money::from_cents),
            has_tier_pricing: false,
            is_marked_up: ceiling.is_some(),
            source_cart_item_id: None,
            tier_schedule: None,
        }
    }

    #[test]
    fn test_price_within_band_passes() {
        // original 50, ceiling 75, price 60
        assert!(validate_line(&line(5000, Some(7500), 6000), OrderMode::Customer).is_ok());
        // boundary values are allowed
        assert!(validate_line(&line(5000, Some(7500), 5000), OrderMode::Customer).is_ok());
        assert!(validate_line(&line(5000, Some(7500), 7500), OrderMode::Customer).is_ok());
    }

    #[test]
    fn test_below_original_price_fails() {
        let err = validate_line(&line(5000, Some(7500), 4000), OrderMode::Customer).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BelowOriginalPrice {
                price: Money::from_cents(4000),
                original_price: Money::from_cents(5000),
            }
        );
    }

    #[test]
    fn test_above_markup_ceiling_fails() {
        let err = validate_line(&line(5000, Some(7500), 8000), OrderMode::Customer).unwrap_err();
        assert_eq!(
            err,
            ValidationError::AboveMarkupCeiling {
                price: Money::from_cents(8000),
                ceiling: Money::from_cents(7500),
            }
        );
    }

    #[test]
    fn test_unknown_ceiling_only_checks_floor() {
        assert!(validate_line(&line(5000, None, 999_900), OrderMode::Customer).is_ok());
        assert!(validate_line(&line(5000, None, 4999), OrderMode::Customer).is_err());
    }

    #[test]
    fn test_clinic_mode_skips_price_band() {
        assert!(validate_line(&line(5000, Some(7500), 100), OrderMode::Clinic).is_ok());
        assert!(validate_line(&line(5000, Some(7500), 100_000), OrderMode::Clinic).is_ok());
    }

    #[test]
    fn test_validate_cart_collects_failing_lines() {
        let mut book = CartBook::new(OrderMode::Customer);
        book.apply_remote(vec![]);
        book.add_product(
            ProductId::new("ok"),
            VariantId::new("v1"),
            "Fine",
            1,
            ProductPricing {
                base_price: Money::from_cents(5000),
                custom_price: Some(Money::from_cents(6000)),
                has_price_history: true,
                latest_marked_up_price: Some(Money::from_cents(6000)),
            },
            false,
        )
        .unwrap();
        book.add_product(
            ProductId::new("bad"),
            VariantId::new("v2"),
            "Undercut",
            1,
            ProductPricing {
                base_price: Money::from_cents(5000),
                custom_price: Some(Money::from_cents(6000)),
                has_price_history: true,
                latest_marked_up_price: Some(Money::from_cents(6000)),
            },
            false,
        )
        .unwrap();
        book.edit_price(&ProductId::new("bad"), Money::from_cents(4000))
            .unwrap();

        let failures = validate_cart(&book);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, ProductId::new("bad"));
    }
}
