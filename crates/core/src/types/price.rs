//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored as decimal strings inside documents (`"19.99"`), so the
//! store can sum them server-side without float rounding.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Prices cannot be negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    /// The input is not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),
}

/// A non-negative monetary amount in the store's single currency.
///
/// Deserialization rejects negative amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

impl Price {
    /// A zero price, the total of an empty cart.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from an amount in cents.
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), 2))
    }

    /// Get the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::str::FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = s
            .trim()
            .parse::<Decimal>()
            .map_err(|_| PriceError::Invalid(s.to_owned()))?;
        Self::new(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_rejected() {
        assert!(matches!(
            Price::new(Decimal::new(-1, 0)),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_sum() {
        let prices = [Price::from_cents(1000), Price::from_cents(2500)];
        let total: Price = prices.iter().sum();
        assert_eq!(total, "35".parse().unwrap());
        assert_eq!(total.to_string(), "35.00");
    }

    #[test]
    fn test_empty_sum_is_zero() {
        let total: Price = std::iter::empty::<Price>().sum();
        assert_eq!(total, Price::ZERO);
    }

    #[test]
    fn test_serialized_as_string() {
        let json = serde_json::to_string(&Price::from_cents(1999)).unwrap();
        assert_eq!(json, "\"19.99\"");
        let parsed: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Price::from_cents(1999));
    }

    #[test]
    fn test_deserialize_negative_rejected() {
        assert!(serde_json::from_str::<Price>("\"-0.01\"").is_err());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!("abc".parse::<Price>(), Err(PriceError::Invalid(_))));
    }
}
