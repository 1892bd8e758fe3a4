//! Stock quantities and movement costs.
//!
//! Both are fixed-point decimals. Callers may hand them over as numbers or as
//! numeric text; `"20"`, `"20.00"` and `20` are the same quantity.

use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{StockError, StockResult};

/// Anything that can be read as a decimal number.
///
/// Implemented for the integer types, `f64`, `Decimal`, text, and the ledger's
/// own value types. Text is trimmed and accepts plain or scientific notation.
pub trait NumericInput {
    fn into_decimal(self) -> Result<Decimal, String>;
}

macro_rules! impl_numeric_input_int {
    ($($t:ty),*) => {
        $(
            impl NumericInput for $t {
                fn into_decimal(self) -> Result<Decimal, String> {
                    Ok(Decimal::from(self))
                }
            }
        )*
    };
}

impl_numeric_input_int!(i32, i64, u32, u64, usize);

impl NumericInput for f64 {
    fn into_decimal(self) -> Result<Decimal, String> {
        Decimal::from_f64(self).ok_or_else(|| format!("'{self}' is not a finite number"))
    }
}

impl NumericInput for Decimal {
    fn into_decimal(self) -> Result<Decimal, String> {
        Ok(self)
    }
}

impl NumericInput for &str {
    fn into_decimal(self) -> Result<Decimal, String> {
        let text = self.trim();
        if text.is_empty() {
            return Err("empty value".to_string());
        }
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(|_| format!("'{self}' is not numeric"))
    }
}

impl NumericInput for String {
    fn into_decimal(self) -> Result<Decimal, String> {
        self.as_str().into_decimal()
    }
}

impl NumericInput for &String {
    fn into_decimal(self) -> Result<Decimal, String> {
        self.as_str().into_decimal()
    }
}

impl NumericInput for Quantity {
    fn into_decimal(self) -> Result<Decimal, String> {
        Ok(self.0)
    }
}

impl NumericInput for Cost {
    fn into_decimal(self) -> Result<Decimal, String> {
        Ok(self.0)
    }
}

/// A non-negative stock quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    /// Parse a caller-supplied quantity. Negative or non-numeric input is
    /// `InvalidQuantity`.
    pub fn parse(input: impl NumericInput) -> StockResult<Self> {
        let value = input.into_decimal().map_err(StockError::invalid_quantity)?;
        Self::from_decimal(value)
    }

    pub fn from_decimal(value: Decimal) -> StockResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(StockError::invalid_quantity(format!(
                "quantity cannot be negative (got {})",
                value.normalize()
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// `self + other`, or `InvalidQuantity` on decimal overflow.
    pub fn plus(self, other: Quantity) -> StockResult<Quantity> {
        self.0
            .checked_add(other.0)
            .map(Quantity)
            .ok_or_else(|| StockError::invalid_quantity("quantity overflow"))
    }

    /// `self - other`, or `None` when the result would be negative.
    pub fn minus(self, other: Quantity) -> Option<Quantity> {
        if other.0 > self.0 {
            return None;
        }
        self.0.checked_sub(other.0).map(Quantity)
    }

    /// Signed difference `self - other`.
    pub fn delta_from(self, other: Quantity) -> Decimal {
        self.0 - other.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ZERO
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = StockError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl From<u32> for Quantity {
    fn from(value: u32) -> Self {
        Self(Decimal::from(value))
    }
}

/// Signed monetary cost attached to a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cost(Decimal);

impl Cost {
    pub const ZERO: Cost = Cost(Decimal::ZERO);

    pub fn parse(input: impl NumericInput) -> StockResult<Self> {
        input
            .into_decimal()
            .map(Cost)
            .map_err(|e| StockError::invalid_quantity(format!("cost: {e}")))
    }

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    /// Same magnitude, opposite sign.
    pub fn negated(self) -> Cost {
        Cost(-self.0)
    }
}

impl core::fmt::Display for Cost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn text_and_numbers_compare_equal() {
        assert_eq!(Quantity::parse("20").unwrap(), Quantity::parse(20).unwrap());
        assert_eq!(Quantity::parse(" 20.00 ").unwrap(), Quantity::parse(20u64).unwrap());
        assert_eq!(Quantity::parse(2.5).unwrap(), Quantity::parse("2.5").unwrap());
        assert_eq!(Quantity::parse("1e2").unwrap(), Quantity::parse(100).unwrap());
    }

    #[test]
    fn negative_and_non_numeric_quantities_are_rejected() {
        assert!(matches!(Quantity::parse(-1), Err(StockError::InvalidQuantity(_))));
        assert!(matches!(Quantity::parse("abc"), Err(StockError::InvalidQuantity(_))));
        assert!(matches!(Quantity::parse(""), Err(StockError::InvalidQuantity(_))));
        assert!(matches!(Quantity::parse(f64::NAN), Err(StockError::InvalidQuantity(_))));
    }

    #[test]
    fn negative_zero_is_zero() {
        let q = Quantity::parse("-0").unwrap();
        assert!(q.is_zero());
    }

    #[test]
    fn minus_refuses_to_go_below_zero() {
        let ten = Quantity::parse(10).unwrap();
        let fifteen = Quantity::parse(15).unwrap();
        assert_eq!(ten.minus(fifteen), None);
        assert_eq!(fifteen.minus(ten), Some(Quantity::parse(5).unwrap()));
        assert_eq!(ten.minus(ten), Some(Quantity::ZERO));
    }

    #[test]
    fn cost_accepts_signed_text_and_negates() {
        let cost = Cost::parse("-12.50").unwrap();
        assert_eq!(cost.negated(), Cost::parse(12.5).unwrap());
        assert_eq!(Cost::ZERO.negated(), Cost::ZERO);
        assert!(matches!(Cost::parse("ten"), Err(StockError::InvalidQuantity(_))));
    }

    #[test]
    fn display_normalizes_scale() {
        assert_eq!(Quantity::parse("20.000").unwrap().to_string(), "20");
    }

    #[test]
    fn quantity_deserializes_only_when_non_negative() {
        let q: Quantity = serde_json::from_str("\"4.5\"").unwrap();
        assert_eq!(q, Quantity::parse("4.5").unwrap());
        assert!(serde_json::from_str::<Quantity>("\"-1\"").is_err());
    }

    proptest! {
        /// Text and integer forms of the same value are interchangeable.
        #[test]
        fn integer_text_round_trips(n in 0u64..1_000_000_000u64) {
            let from_text = Quantity::parse(n.to_string()).unwrap();
            let from_int = Quantity::parse(n).unwrap();
            prop_assert_eq!(from_text, from_int);
        }
    }
}
