//! Quantity-tiered pricing for clinic orders.
//!
//! Clinics buy at quantity breaks: a rule set like `1-4 -> $10, 5- -> $8`
//! prices a line by whichever rule's inclusive range contains the quantity.
//! Rule sets come from the backend per variant; a local fallback table can
//! stand in until the remote rules arrive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Money;

/// One quantity break. `end_count: None` means the range is unbounded above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRule {
    pub start_count: u32,
    pub end_count: Option<u32>,
    pub tiered_price: Money,
}

impl TierRule {
    /// Whether `quantity` falls inside this rule's inclusive range.
    #[must_use]
    pub fn contains(&self, quantity: u32) -> bool {
        quantity >= self.start_count && self.end_count.is_none_or(|end| quantity <= end)
    }
}

/// A malformed rule set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TierRuleError {
    /// A rule's end bound precedes its start bound.
    #[error("tier range {start}-{end} is inverted")]
    InvertedRange { start: u32, end: u32 },

    /// Two rules claim the same quantity.
    #[error("tier ranges overlap at quantity {0}")]
    Overlap(u32),
}

/// An ordered, validated, non-overlapping set of tier rules for one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSchedule {
    rules: Vec<TierRule>,
}

impl TierSchedule {
    /// Build a schedule, sorting by `start_count` and rejecting overlaps.
    ///
    /// # Errors
    ///
    /// Returns [`TierRuleError`] if any range is inverted or two ranges
    /// intersect. An unbounded rule that is not last always overlaps.
    pub fn new(mut rules: Vec<TierRule>) -> Result<Self, TierRuleError> {
        for rule in &rules {
            if let Some(end) = rule.end_count
                && end < rule.start_count
            {
                return Err(TierRuleError::InvertedRange {
                    start: rule.start_count,
                    end,
                });
            }
        }
        rules.sort_by_key(|rule| rule.start_count);
        for pair in rules.windows(2) {
            if let [prev, next] = pair
                && prev.end_count.is_none_or(|end| end >= next.start_count)
            {
                return Err(TierRuleError::Overlap(next.start_count));
            }
        }
        Ok(Self { rules })
    }

    /// The unit price for `quantity`, or `None` when no range covers it.
    ///
    /// A gap is a data problem on the backend, not a user error - callers
    /// leave the line's price unchanged rather than failing.
    #[must_use]
    pub fn price_for(&self, quantity: u32) -> Option<Money> {
        self.rules
            .iter()
            .find(|rule| rule.contains(quantity))
            .map(|rule| rule.tiered_price)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn rules(&self) -> &[TierRule] {
        &self.rules
    }
}
