//! # Money Module
//!
//! Catalog prices as integer cents.
//!
//! ## Why integers?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Floating point cannot represent 0.10 exactly:                          │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                     │
//! │                                                                         │
//! │  A price filter "max_price = 19.99" compared against a stored          │
//! │  19.990000000000002 silently drops the row. Comparing 1999 against     │
//! │  1999 never does.                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices are two-decimal amounts, so one cent is the smallest step. The
//! database, the key-value items, the filters and the JSON API all carry
//! cents. Only a UI converts to a decimal string for display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A monetary amount in cents.
///
/// Serialized as a bare integer: `{"price": 1099}` is $10.99.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use catalog_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented rendering, e.g. `$10.99`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
    }

    #[test]
    fn test_ordering_is_by_cents() {
        assert!(Money::from_cents(1999) < Money::from_cents(2000));
        assert!(Money::from_cents(-1) < Money::from_cents(0));
    }

    #[test]
    fn test_serializes_as_plain_integer() {
        let json = serde_json::to_string(&Money::from_cents(250)).unwrap();
        assert_eq!(json, "250");
        let back: Money = serde_json::from_str("250").unwrap();
        assert_eq!(back, Money::from_cents(250));
    }
}
