//! Signed on-chain integer amounts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::Decimal;

/// A signed amount in on-chain base units (e.g. 1e18 per share).
///
/// Event parameters are `int256`/`uint256`; values outside `i128` are rejected
/// at decode time rather than wrapped. Serialized as a decimal string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigAmount(pub i128);

impl BigAmount {
    pub const ZERO: BigAmount = BigAmount(0);

    pub fn new(raw: i128) -> Self {
        BigAmount(raw)
    }

    pub fn raw(&self) -> i128 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Magnitude; `None` for `i128::MIN`, which has no positive counterpart.
    pub fn checked_abs(&self) -> Option<BigAmount> {
        self.0.checked_abs().map(BigAmount)
    }

    pub fn checked_add(self, rhs: BigAmount) -> Option<BigAmount> {
        self.0.checked_add(rhs.0).map(BigAmount)
    }

    pub fn checked_sub(self, rhs: BigAmount) -> Option<BigAmount> {
        self.0.checked_sub(rhs.0).map(BigAmount)
    }

    /// Decimal mirror of this amount given the token's decimals.
    pub fn to_decimal(&self, decimals: u32) -> Option<Decimal> {
        Decimal::from_base_units(self.0, decimals)
    }
}

impl fmt::Display for BigAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BigAmount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i128>().map(BigAmount)
    }
}

impl Serialize for BigAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BigAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
