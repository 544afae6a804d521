//! Checkout-level error taxonomy.
//!
//! Validation failures block submission and carry per-line details; service
//! failures wrap the layer that produced them. Superseded async responses
//! are not errors at all - the session discards them silently.

use thiserror::Error;

use medcart_core::cart::CartError;
use medcart_core::types::ProductId;
use medcart_core::validate::ValidationError;

use crate::orders::OrdersError;
use crate::services::payment::{PaymentError, TokenizationError};
use crate::services::tax::TaxError;

/// Everything that can stop a checkout session from making progress.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A cart operation was rejected (not hydrated, unknown line, ...).
    #[error("cart error: {0}")]
    Cart(#[from] CartError),

    /// One or more lines failed price validation; submission is blocked and
    /// the per-line errors are surfaced inline.
    #[error("{} line(s) failed price validation", .0.len())]
    Validation(Vec<(ProductId, ValidationError)>),

    /// Customer orders need a customer.
    #[error("a customer must be selected for a customer order")]
    CustomerRequired,

    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// No usable tax figure yet (still quoting, or failed with no fallback).
    #[error("tax is not available for this order yet")]
    TaxUnavailable,

    /// A submission is already outstanding; at most one is allowed in
    /// flight per session to prevent duplicate charges.
    #[error("an order submission is already in flight")]
    SubmissionInFlight,

    /// This session already placed its order.
    #[error("this checkout session already submitted an order")]
    AlreadySubmitted,

    /// Ordering backend failure.
    #[error("ordering backend error: {0}")]
    Orders(#[from] OrdersError),

    /// Tax service failure.
    #[error("tax service error: {0}")]
    Tax(#[from] TaxError),

    /// Card tokenization failure; the user must retry the submission.
    #[error(transparent)]
    Tokenization(#[from] TokenizationError),

    /// Payment processing failure.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_counts_lines() {
        let err = CheckoutError::Validation(vec![
            (
                ProductId::new("p1"),
                ValidationError::BelowOriginalPrice {
                    price: medcart_core::types::Money::from_cents(100),
                    original_price: medcart_core::types::Money::from_cents(200),
                },
            ),
        ]);
        assert_eq!(err.to_string(), "1 line(s) failed price validation");
    }
}
