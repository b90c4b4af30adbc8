//! Monetary amounts.
//!
//! Prices and costs are stored as fixed-point decimals with at most 10 digits,
//! 2 of them after the decimal point (i.e. up to 99,999,999.99).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

pub const MAX_DIGITS: u32 = 10;
pub const DECIMAL_PLACES: u32 = 2;

/// A validated, non-negative price.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl ValueObject for Price {}

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    /// Validate `value` for `field`: non-negative, ≤2 decimal places, ≤10 digits.
    pub fn parse(field: &str, value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::field(field, "must be greater than or equal to 0"));
        }
        let normalized = value.normalize();
        if normalized.scale() > DECIMAL_PLACES {
            return Err(DomainError::field(
                field,
                format!("ensure there are no more than {DECIMAL_PLACES} decimal places"),
            ));
        }
        let whole_digits = normalized.trunc().abs().to_string().trim_start_matches('0').len() as u32;
        if whole_digits > MAX_DIGITS - DECIMAL_PLACES {
            return Err(DomainError::field(
                field,
                format!("ensure there are no more than {MAX_DIGITS} digits in total"),
            ));
        }
        let mut stored = value;
        stored.rescale(DECIMAL_PLACES);
        Ok(Self(stored))
    }

    pub fn parse_opt(field: &str, value: Option<Decimal>) -> DomainResult<Option<Self>> {
        value.map(|v| Self::parse(field, v)).transpose()
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// `quantity × price`, exact (no rounding beyond the 2 stored places).
    pub fn times(&self, quantity: i64) -> Decimal {
        Decimal::from(quantity) * self.0
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_two_decimal_places_and_rescales() {
        let p = Price::parse("purchase_price", Decimal::new(125, 1)).unwrap();
        assert_eq!(p.amount().to_string(), "12.50");
    }

    #[test]
    fn rejects_negative_and_extra_precision() {
        assert!(Price::parse("sale_price", Decimal::new(-1, 0)).is_err());
        assert!(Price::parse("sale_price", Decimal::new(1001, 3)).is_err());
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        assert!(Price::parse("sale_price", Decimal::new(15000, 3)).is_ok());
    }

    #[test]
    fn rejects_more_than_ten_digits() {
        assert!(Price::parse("final_cost", Decimal::new(9_999_999_999, 2)).is_ok());
        assert!(Price::parse("final_cost", Decimal::new(100_000_000, 0)).is_err());
    }

    #[test]
    fn times_is_exact() {
        let p = Price::parse("unit_price", Decimal::new(1999, 2)).unwrap();
        assert_eq!(p.times(3), Decimal::new(5997, 2));
        assert_eq!(p.times(0), Decimal::ZERO);
    }
}
