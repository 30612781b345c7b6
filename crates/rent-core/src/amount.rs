//! Value amounts with fixed-point precision.
//!
//! Rent, collateral and payouts are all expressed as [`Amount`], stored as an
//! integer count of the smallest unit (10^-9 of a whole unit). Arithmetic is
//! checked; callers decide how to surface overflow.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// Number of decimal places carried by an [`Amount`].
pub const DECIMALS: u32 = 9;

/// Smallest units per whole unit.
pub const UNITS_PER_WHOLE: u64 = 1_000_000_000;

/// A non-negative quantity of value units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Largest representable amount.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates an amount from smallest units.
    #[must_use]
    pub const fn from_raw(units: u64) -> Self {
        Self(units)
    }

    /// Creates an amount from whole units, saturating at [`Amount::MAX`].
    #[must_use]
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole.saturating_mul(UNITS_PER_WHOLE))
    }

    /// Returns the amount in smallest units.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checked addition. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Subtraction clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Returns true if this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_WHOLE;
        let frac = self.0 % UNITS_PER_WHOLE;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let frac = format!("{frac:09}");
        write!(f, "{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| CoreError::InvalidAmount(format!("{why}: {s:?}"));

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("empty"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("not a non-negative decimal"));
        }
        if frac.len() > DECIMALS as usize {
            return Err(invalid("too many decimal places"));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("whole part out of range"))?
        };
        let frac: u64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<9}")
                .parse()
                .map_err(|_| invalid("bad fractional part"))?
        };

        whole
            .checked_mul(UNITS_PER_WHOLE)
            .and_then(|w| w.checked_add(frac))
            .map(Self)
            .ok_or_else(|| invalid("overflow"))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn from_whole_scales_by_precision() {
        assert_eq!(Amount::from_whole(3).raw(), 3_000_000_000);
        assert_eq!(Amount::from_whole(u64::MAX), Amount::MAX);
    }

    #[test]
    fn checked_arithmetic() {
        let a = Amount::from_whole(5);
        let b = Amount::from_whole(3);
        assert_eq!(a.checked_add(b), Some(Amount::from_whole(8)));
        assert_eq!(a.checked_sub(b), Some(Amount::from_whole(2)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(Amount::MAX.checked_add(Amount::from_raw(1)), None);
        assert_eq!(b.saturating_sub(a), Amount::ZERO);
    }

    #[test_case("1", 1_000_000_000 ; "whole")]
    #[test_case("0.1", 100_000_000 ; "one tenth")]
    #[test_case(".5", 500_000_000 ; "leading dot")]
    #[test_case("2.", 2_000_000_000 ; "trailing dot")]
    #[test_case("0.000000001", 1 ; "smallest unit")]
    fn parses_decimal(input: &str, raw: u64) {
        assert_eq!(input.parse::<Amount>().expect("parse").raw(), raw);
    }

    #[test_case("" ; "empty")]
    #[test_case("." ; "lone dot")]
    #[test_case("-1" ; "negative")]
    #[test_case("1.0000000001" ; "too precise")]
    #[test_case("1.2.3" ; "two dots")]
    #[test_case("abc" ; "letters")]
    #[test_case("18446744074" ; "overflow")]
    fn rejects_malformed(input: &str) {
        assert!(input.parse::<Amount>().is_err());
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Amount::from_raw(1_500_000_000).to_string(), "1.5");
        assert_eq!(Amount::from_whole(7).to_string(), "7");
        assert_eq!(Amount::ZERO.to_string(), "0");
        assert_eq!(Amount::from_raw(1).to_string(), "0.000000001");
    }

    #[test]
    fn serializes_as_decimal_string() {
        let amount: Amount = "0.25".parse().expect("parse");
        let json = serde_json::to_string(&amount).expect("serialize");
        assert_eq!(json, r#""0.25""#);
        let back: Amount = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, amount);
    }
}
