//! Decimal mirrors of on-chain amounts.
//!
//! Share and collateral quantities are kept as integers on chain; the ledger
//! also stores them scaled by token decimals so prices can be computed without
//! floating point.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scaled share or collateral quantity, or a price.
///
/// Serialized as a JSON string so stored bodies compare byte-for-byte.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Trailing zeros stripped, never exponent notation.
    pub fn to_canonical_string(&self) -> String {
        self.0.normalize().to_string()
    }

    /// Interpret `raw` as an integer amount with `decimals` fractional digits.
    ///
    /// Returns `None` when the value does not fit the 96-bit mantissa.
    pub fn from_base_units(raw: i128, decimals: u32) -> Option<Self> {
        RustDecimal::try_from_i128_with_scale(raw, decimals)
            .ok()
            .map(|d| Decimal(d.normalize()))
    }

    /// Convert back to integer base units, truncating toward zero.
    pub fn to_base_units(&self, decimals: u32) -> Option<i128> {
        let factor = RustDecimal::try_from_i128_with_scale(10i128.checked_pow(decimals)?, 0).ok()?;
        self.0.checked_mul(factor)?.trunc().to_i128()
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn checked_add(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_mul(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    /// Division that refuses a zero denominator instead of panicking.
    pub fn checked_div(self, rhs: Decimal) -> Option<Decimal> {
        if rhs.is_zero() {
            return None;
        }
        self.0.checked_div(rhs.0).map(Decimal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_string_strips_trailing_zeros() {
        let cases = [("0.6000", "0.6"), ("150.0", "150"), ("-1.50", "-1.5"), ("0.0001", "0.0001")];
        for (input, expected) in cases {
            let decimal = Decimal::from_str_canonical(input).unwrap();
            assert_eq!(decimal.to_canonical_string(), expected);
        }
    }

    #[test]
    fn test_decimal_json_is_string() {
        let decimal = Decimal::from_str_canonical("0.6").unwrap();
        let json = serde_json::to_value(decimal).unwrap();
        assert!(json.is_string());
        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, decimal);
    }

    #[test]
    fn test_from_base_units() {
        let shares = Decimal::from_base_units(150_000_000_000_000_000_000, 18).unwrap();
        assert_eq!(shares.to_canonical_string(), "150");

        let usdc = Decimal::from_base_units(-1_500_000, 6).unwrap();
        assert_eq!(usdc.to_canonical_string(), "-1.5");
    }

    #[test]
    fn test_from_base_units_overflow() {
        assert!(Decimal::from_base_units(i128::MAX, 18).is_none());
    }

    #[test]
    fn test_to_base_units_truncates() {
        let price = Decimal::from_str_canonical("1.2345678").unwrap();
        assert_eq!(price.to_base_units(6), Some(1_234_567));
        let negative = Decimal::from_str_canonical("-0.0000019").unwrap();
        assert_eq!(negative.to_base_units(6), Some(-1));
        assert_eq!(Decimal::zero().to_base_units(6), Some(0));
    }

    #[test]
    fn test_checked_div_zero() {
        let a = Decimal::from_str_canonical("10").unwrap();
        assert!(a.checked_div(Decimal::zero()).is_none());
        assert_eq!(
            a.checked_div(Decimal::from(4)).unwrap().to_canonical_string(),
            "2.5"
        );
    }
}
