//! Money type backed by decimal arithmetic.
//!
//! Prices travel through the API as decimal strings (`"19.99"`) and are
//! persisted as integer cents, so a [`Price`] always carries exactly two
//! decimal places and converts to and from cents losslessly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum PriceError {
    /// The amount is negative.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("price cannot have more than two decimal places")]
    TooPrecise,
    /// The amount does not fit in 64-bit cents.
    #[error("price is too large")]
    TooLarge,
}

/// A non-negative monetary amount with two decimal places.
///
/// Stored in the database as integer cents (`price_cents`); see
/// [`Price::from_cents`] and [`Price::to_cents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Zero, the total of an empty cart.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, 2));

    /// Validate and normalize a decimal amount into a `Price`.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative, has more than two
    /// decimal places, or exceeds the 64-bit cents range.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }

        let mut amount = amount.normalize();
        if amount.scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        amount.rescale(2);

        // After rescale(2) the mantissa is the amount in cents.
        i64::try_from(amount.mantissa()).map_err(|_| PriceError::TooLarge)?;

        Ok(Self(amount))
    }

    /// Build a `Price` from integer cents, as stored in the database.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The amount in integer cents, for storage.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn to_cents(self) -> i64 {
        // Scale is pinned to 2 and the mantissa was bounds-checked in `new`.
        self.0.mantissa() as i64
    }

    /// The decimal amount (e.g. `19.99`).
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    ///
    /// Saturates at the 64-bit cents range rather than wrapping.
    #[must_use]
    pub fn line_total(self, quantity: i64) -> Self {
        Self::from_cents(self.to_cents().saturating_mul(quantity))
    }

    /// Sum a sequence of prices, saturating at the 64-bit cents range.
    #[must_use]
    pub fn sum<I: IntoIterator<Item = Self>>(prices: I) -> Self {
        Self::from_cents(
            prices
                .into_iter()
                .fold(0_i64, |acc, p| acc.saturating_add(p.to_cents())),
        )
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn new_pins_scale_to_two_places() {
        assert_eq!(Price::new(dec("10")).unwrap().to_string(), "10.00");
        assert_eq!(Price::new(dec("19.9")).unwrap().to_string(), "19.90");
        assert_eq!(Price::new(dec("0.05")).unwrap().to_cents(), 5);
    }

    #[test]
    fn new_rejects_invalid_amounts() {
        assert!(matches!(Price::new(dec("-1")), Err(PriceError::Negative)));
        assert!(matches!(
            Price::new(dec("1.999")),
            Err(PriceError::TooPrecise)
        ));
    }

    #[test]
    fn cents_round_trip() {
        let price = Price::new(dec("19.99")).unwrap();
        assert_eq!(price.to_cents(), 1999);
        assert_eq!(Price::from_cents(1999), price);
        assert_eq!(Price::ZERO.to_cents(), 0);
    }

    #[test]
    fn line_totals_and_sums() {
        let a = Price::new(dec("10.00")).unwrap().line_total(2);
        let b = Price::new(dec("5.00")).unwrap().line_total(1);
        assert_eq!(a.to_string(), "20.00");

        let total = Price::sum([a, b]);
        assert_eq!(total.to_string(), "25.00");
    }

    #[test]
    fn serde_uses_decimal_representation() {
        let price = Price::new(dec("25.00")).unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"25.00\"");

        let back: Price = serde_json::from_str("\"10.50\"").unwrap();
        assert_eq!(back.to_cents(), 1050);

        // Validation applies on deserialization as well.
        assert!(serde_json::from_str::<Price>("\"-3.00\"").is_err());
    }
}
