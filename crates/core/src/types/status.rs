//! Status enums for orders and product requests.

use serde::{Deserialize, Serialize};

/// Order lifecycle status as reported by the ordering backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created but not yet paid.
    #[default]
    Pending,
    /// Payment captured.
    Paid,
    /// Shipped to the patient or clinic.
    Fulfilled,
    /// Cancelled before fulfillment.
    Cancelled,
}

impl OrderStatus {
    /// Whether the order can still be cancelled.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }
}

/// Status of a patient's product/prescription request awaiting doctor review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    /// Whether the request is still awaiting a decision.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending)
    }
}
