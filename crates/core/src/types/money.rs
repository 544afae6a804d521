//! Type-safe money representation using decimal arithmetic.
//!
//! All monetary values in the checkout engine flow through [`Money`], a thin
//! wrapper over [`rust_decimal::Decimal`]. Decimal arithmetic keeps repeated
//! subtotal/tax accumulation free of binary floating-point drift; the payment
//! wire format reads whole cents out via [`Money::cents`].
//!
//! Currency is USD throughout - the ordering backend quotes and settles in a
//! single currency, so no code is carried per value.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors producing or converting a [`Money`] value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// The string was not a valid decimal amount.
    #[error("invalid money amount: {0}")]
    InvalidAmount(String),

    /// A negative amount where only non-negative money is allowed.
    #[error("negative money amount: {0}")]
    Negative(Decimal),
}

/// A non-negative USD amount.
///
/// Construct via [`Money::from_cents`], [`Money::new`], or [`FromStr`];
/// arithmetic is exact and display rounding is half-up to 2 decimal places.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero dollars.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a money value from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for amounts below zero.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a money value from whole cents.
    #[must_use]
    pub fn from_cents(cents: u64) -> Self {
        Self(Decimal::new(
            i64::try_from(cents).unwrap_or(i64::MAX),
            2,
        ))
    }

    /// The raw decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount rounded half-up to 2 decimal places.
    ///
    /// This is the figure shown to users and sent to the payment service.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Whole cents after half-up rounding.
    #[must_use]
    pub fn cents(&self) -> u64 {
        (self.rounded().0 * Decimal::ONE_HUNDRED)
            .to_u64()
            .unwrap_or(0)
    }

    /// Subtraction clamped at zero.
    #[must_use]
    pub fn saturating_sub(&self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|_| MoneyError::InvalidAmount(s.to_string()))?;
        Self::new(amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.rounded().0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    /// Exact subtraction; prefer [`Money::saturating_sub`] unless the caller
    /// has already established `self >= rhs`.
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, qty: u32) -> Self {
        Self(self.0 * Decimal::from(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
