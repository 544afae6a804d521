//! Tax quote state machine.
//!
//! The async half (the actual service call, retries, backoff) lives in the
//! checkout crate; this module owns the bookkeeping: when a quote may be
//! issued, which in-flight quote is current, and what happens to late or
//! failed responses. Supersession is tracked by generation identity - every
//! input change bumps the generation, and a response only applies if it
//! carries the generation it was issued under.

use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Number of digits a postal code must normalize to before quoting.
pub const POSTAL_CODE_LEN: usize = 5;

/// Normalize free-text postal input to a quotable 5-digit code.
///
/// Keeps digits only and truncates; returns `None` until at least 5 digits
/// are present, so partial input never triggers a tax request.
#[must_use]
pub fn normalize_postal_code(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(char::is_ascii_digit)
        .take(POSTAL_CODE_LEN)
        .collect();
    (digits.len() == POSTAL_CODE_LEN).then_some(digits)
}

/// A settled tax quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxQuote {
    pub postal_code: String,
    pub subtotal: Money,
    pub tax_amount: Money,
    /// `subtotal + tax_amount`, rounded half-up to cents.
    pub total: Money,
}

/// Where the current checkout session stands on tax.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaxState {
    /// No quotable input yet.
    #[default]
    Idle,
    /// A quote request is outstanding for the stored generation.
    Quoting { generation: u64 },
    /// The latest quote applied.
    Quoted(TaxQuote),
    /// Retries exhausted. Terminal until an input changes; checkout may
    /// proceed only on the fallback figure, if one exists.
    Failed { fallback: Option<Money> },
}

/// Permission to issue one quote request. Returned by
/// [`TaxTracker::begin_quote`]; hand the `generation` back with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTicket {
    pub generation: u64,
    pub postal_code: String,
    pub subtotal: Money,
}

/// What became of a completed quote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteDisposition {
    /// The response matched the current generation and was applied.
    Applied,
    /// A newer request superseded this one; the response was discarded.
    Stale,
}

/// Generation-counted tax quote tracker for one checkout session.
#[derive(Debug, Clone, Default)]
pub struct TaxTracker {
    state: TaxState,
    generation: u64,
    /// Last tax figure known for this order, used when the service is down.
    last_known_tax: Option<Money>,
}

impl TaxTracker {
    #[must_use]
    pub fn new(last_known_tax: Option<Money>) -> Self {
        Self {
            last_known_tax,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn state(&self) -> &TaxState {
        &self.state
    }

    /// Register an input change and, if the postal code is quotable, open a
    /// new quote generation.
    ///
    /// Any in-flight request is implicitly superseded: its generation no
    /// longer matches, so its response will be discarded on arrival.
    /// Returns `None` (and resets to [`TaxState::Idle`]) for unquotable
    /// postal input.
    pub fn begin_quote(&mut self, raw_postal: &str, subtotal: Money) -> Option<QuoteTicket> {
        self.generation += 1;
        let Some(postal_code) = normalize_postal_code(raw_postal) else {
            self.state = TaxState::Idle;
            return None;
        };
        self.state = TaxState::Quoting {
            generation: self.generation,
        };
        Some(QuoteTicket {
            generation: self.generation,
            postal_code,
            subtotal,
        })
    }

    /// Apply a successful quote response.
    pub fn complete(&mut self, ticket: &QuoteTicket, tax_amount: Money) -> QuoteDisposition {
        if ticket.generation != self.generation {
            return QuoteDisposition::Stale;
        }
        let total = (ticket.subtotal + tax_amount).rounded();
        self.last_known_tax = Some(tax_amount);
        self.state = TaxState::Quoted(TaxQuote {
            postal_code: ticket.postal_code.clone(),
            subtotal: ticket.subtotal,
            tax_amount,
            total,
        });
        QuoteDisposition::Applied
    }

    /// Record that a quote request exhausted its retries.
    pub fn fail(&mut self, ticket: &QuoteTicket) -> QuoteDisposition {
        if ticket.generation != self.generation {
            return QuoteDisposition::Stale;
        }
        self.state = TaxState::Failed {
            fallback: self.last_known_tax,
        };
        QuoteDisposition::Applied
    }

    /// The tax figure checkout may proceed on, if any.
    ///
    /// `None` while idle, while a quote is outstanding, or after a failure
    /// with no fallback - in all of those cases submission is blocked.
    #[must_use]
    pub const fn usable_tax(&self) -> Option<Money> {
        match &self.state {
            TaxState::Quoted(quote) => Some(quote.tax_amount),
            TaxState::Failed { fallback } => *fallback,
            TaxState::Idle | TaxState::Quoting { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalize_postal_code() {
        assert_eq!(normalize_postal_code("94107"), Some("94107".to_string()));
        assert_eq!(
            normalize_postal_code("94107-1234"),
            Some("94107".to_string())
        );
        assert_eq!(normalize_postal_code(" 9 4 1 0 7 "), Some("94107".to_string()));
        assert_eq!(normalize_postal_code("941"), None);
        assert_eq!(normalize_postal_code(""), None);
        assert_eq!(normalize_postal_code("abcde"), None);
    }

    #[test]
    fn test_incomplete_postal_never_opens_a_quote() {
        let mut tracker = TaxTracker::default();
        assert!(tracker.begin_quote("941", money("100.00")).is_none());
        assert_eq!(tracker.state(), &TaxState::Idle);

        // completing the code opens exactly one generation
        let ticket = tracker.begin_quote("94107", money("100.00")).unwrap();
        assert_eq!(tracker.state(), &TaxState::Quoting { generation: ticket.generation });
    }

    #[test]
    fn test_quote_applies_and_totals() {
        let mut tracker = TaxTracker::default();
        let ticket = tracker.begin_quote("90210", money("100.00")).unwrap();
        assert_eq!(
            tracker.complete(&ticket, money("8.75")),
            QuoteDisposition::Applied
        );
        let TaxState::Quoted(quote) = tracker.state() else {
            panic!("expected quoted state");
        };
        assert_eq!(quote.total, money("108.75"));
        assert_eq!(tracker.usable_tax(), Some(money("8.75")));
    }

    #[test]
    fn test_stale_response_discarded_latest_wins() {
        let mut tracker = TaxTracker::default();
        let first = tracker.begin_quote("90210", money("100.00")).unwrap();
        // user edits the postal code while the first request is in flight
        let second = tracker.begin_quote("94107", money("100.00")).unwrap();

        assert_eq!(
            tracker.complete(&first, money("8.75")),
            QuoteDisposition::Stale
        );
        assert!(matches!(tracker.state(), TaxState::Quoting { .. }));

        assert_eq!(
            tracker.complete(&second, money("8.63")),
            QuoteDisposition::Applied
        );
        let TaxState::Quoted(quote) = tracker.state() else {
            panic!("expected quoted state");
        };
        assert_eq!(quote.postal_code, "94107");
        assert_eq!(quote.tax_amount, money("8.63"));
    }

    #[test]
    fn test_failure_falls_back_to_last_known_tax() {
        let mut tracker = TaxTracker::new(Some(money("7.10")));
        let ticket = tracker.begin_quote("90210", money("100.00")).unwrap();
        tracker.fail(&ticket);
        assert_eq!(
            tracker.state(),
            &TaxState::Failed {
                fallback: Some(money("7.10"))
            }
        );
        assert_eq!(tracker.usable_tax(), Some(money("7.10")));
    }

    #[test]
    fn test_failure_without_fallback_blocks() {
        let mut tracker = TaxTracker::default();
        let ticket = tracker.begin_quote("90210", money("100.00")).unwrap();
        tracker.fail(&ticket);
        assert_eq!(tracker.usable_tax(), None);

        // terminal until an input changes
        assert!(matches!(tracker.state(), TaxState::Failed { .. }));
        let ticket = tracker.begin_quote("90210", money("120.00")).unwrap();
        assert_eq!(
            tracker.state(),
            &TaxState::Quoting {
                generation: ticket.generation
            }
        );
    }

    #[test]
    fn test_stale_failure_does_not_clobber_newer_quote() {
        let mut tracker = TaxTracker::default();
        let first = tracker.begin_quote("90210", money("100.00")).unwrap();
        let second = tracker.begin_quote("94107", money("100.00")).unwrap();
        tracker.complete(&second, money("8.63"));

        assert_eq!(tracker.fail(&first), QuoteDisposition::Stale);
        assert!(matches!(tracker.state(), TaxState::Quoted(_)));
    }

    #[test]
    fn test_success_refreshes_fallback_figure() {
        let mut tracker = TaxTracker::default();
        let ticket = tracker.begin_quote("90210", money("100.00")).unwrap();
        tracker.complete(&ticket, money("8.75"));

        let ticket = tracker.begin_quote("90210", money("200.00")).unwrap();
        tracker.fail(&ticket);
        assert_eq!(tracker.usable_tax(), Some(money("8.75")));
    }
}
