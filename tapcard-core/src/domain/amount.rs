//! Exact decimal amounts for balances and deltas

use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{DecodingError, Error, Result};

/// Grammar of the canonical literal: optional minus, integer part without
/// leading zeros, optional fraction. No exponent, no plus sign, no grouping,
/// no surrounding whitespace. Negative zero is refused separately.
fn canonical_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?$").expect("canonical decimal pattern is valid")
    })
}

/// Signed base-10 amount with no binary rounding
///
/// Wraps `rust_decimal::Decimal` (up to 28 significant digits) and keeps the
/// scale of the literal it was parsed from, so `"100.00"` prints back as
/// `"100.00"`. Equality is numeric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecimalAmount(Decimal);

impl DecimalAmount {
    pub const ZERO: DecimalAmount = DecimalAmount(Decimal::ZERO);

    /// Build from an integer mantissa and a decimal scale, e.g. `new(10000, 2)` is `100.00`
    pub fn new(mantissa: i64, scale: u32) -> Self {
        Self(Decimal::new(mantissa, scale))
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Parse a literal in the exact format produced by [`DecimalAmount::to_canonical`]
    pub fn parse_canonical(literal: &str) -> std::result::Result<Self, DecodingError> {
        let invalid = || DecodingError::InvalidBalance(literal.to_string());

        if !canonical_pattern().is_match(literal) {
            return Err(invalid());
        }

        let value = Decimal::from_str_exact(literal).map_err(|_| invalid())?;
        if value.is_zero() && literal.starts_with('-') {
            return Err(invalid());
        }

        // from_str_exact refuses to round, but double-check the scale survived
        let fraction_digits = literal.split_once('.').map_or(0, |(_, f)| f.len());
        if value.scale() as usize != fraction_digits {
            return Err(invalid());
        }

        Ok(Self(value))
    }

    /// Canonical text: plain digits, `-` for negatives, scale preserved.
    /// Zero never carries a sign.
    pub fn to_canonical(&self) -> String {
        if self.0.is_zero() {
            self.0.abs().to_string()
        } else {
            self.0.to_string()
        }
    }

    /// Exact sum, or `Error::Overflow` when it does not fit in 28 significant digits
    ///
    /// `Decimal::checked_add` rounds the fraction instead of failing when the
    /// exact sum needs more digits, so the result is checked for lost scale
    /// and for reversibility.
    pub fn checked_add(&self, other: &DecimalAmount) -> Result<DecimalAmount> {
        let sum = self.0.checked_add(other.0).ok_or(Error::Overflow)?;
        let exact_scale = self.0.scale().max(other.0.scale());
        if sum.scale() < exact_scale || sum.checked_sub(other.0) != Some(self.0) {
            return Err(Error::Overflow);
        }
        Ok(DecimalAmount(sum))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_positive()
    }
}

impl Neg for DecimalAmount {
    type Output = DecimalAmount;

    fn neg(self) -> Self::Output {
        DecimalAmount(-self.0)
    }
}

impl fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

impl FromStr for DecimalAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::parse_canonical(s)?)
    }
}

impl From<Decimal> for DecimalAmount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_keeps_scale() {
        let amount = DecimalAmount::parse_canonical("100.00").unwrap();
        assert_eq!(amount.to_canonical(), "100.00");
        assert_eq!(amount, DecimalAmount::new(10000, 2));
    }

    #[test]
    fn test_parse_rejects_non_canonical_literals() {
        for literal in [
            "abc", "", " 1", "1 ", "+1", "1e3", "1,000", "1_000", ".5", "5.", "--1",
            "007", "00.5", "-01", "-0", "-0.00",
        ] {
            assert!(
                DecimalAmount::parse_canonical(literal).is_err(),
                "{literal:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_accepts_negative_and_integer() {
        assert_eq!(
            DecimalAmount::parse_canonical("-50").unwrap(),
            DecimalAmount::new(-50, 0)
        );
        assert_eq!(
            DecimalAmount::parse_canonical("12345678901234567890.12345678").unwrap().to_canonical(),
            "12345678901234567890.12345678"
        );
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(DecimalAmount::parse_canonical("99999999999999999999999999999999").is_err());
    }

    #[test]
    fn test_exact_addition() {
        let balance = DecimalAmount::parse_canonical("100.00").unwrap();
        let delta = DecimalAmount::parse_canonical("-50").unwrap();
        let result = balance.checked_add(&delta).unwrap();
        assert_eq!(result.to_canonical(), "50.00");

        let tenth = DecimalAmount::parse_canonical("0.1").unwrap();
        let fifth = DecimalAmount::parse_canonical("0.2").unwrap();
        assert_eq!(tenth.checked_add(&fifth).unwrap().to_canonical(), "0.3");
    }

    #[test]
    fn test_zero_forms_are_canonical() {
        assert_eq!(DecimalAmount::parse_canonical("0").unwrap().to_canonical(), "0");
        assert_eq!(DecimalAmount::parse_canonical("0.00").unwrap().to_canonical(), "0.00");

        let back_to_zero = DecimalAmount::new(-500, 2).checked_add(&DecimalAmount::new(5, 0)).unwrap();
        assert!(back_to_zero.is_zero());
        assert_eq!(back_to_zero.to_canonical(), "0.00");
        assert_eq!((-DecimalAmount::new(0, 1)).to_canonical(), "0.0");
    }

    #[test]
    fn test_sum_needing_more_digits_is_overflow() {
        let fine = DecimalAmount::parse_canonical("1.0000000000000000000000000001").unwrap();
        let ten = DecimalAmount::new(10, 0);
        assert!(matches!(fine.checked_add(&ten), Err(Error::Overflow)));
        assert!(matches!(ten.checked_add(&fine), Err(Error::Overflow)));

        // Same operands one digit shorter still add exactly
        let shorter = DecimalAmount::parse_canonical("1.000000000000000000000000001").unwrap();
        assert_eq!(
            shorter.checked_add(&ten).unwrap().to_canonical(),
            "11.000000000000000000000000001"
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let max = DecimalAmount::from_decimal(Decimal::MAX);
        let one = DecimalAmount::new(1, 0);
        assert!(matches!(max.checked_add(&one), Err(Error::Overflow)));
    }

    #[test]
    fn test_sign_helpers() {
        assert!(DecimalAmount::ZERO.is_zero());
        assert!(!DecimalAmount::ZERO.is_negative());
        assert!(!DecimalAmount::ZERO.is_positive());
        let amount = DecimalAmount::new(2500, 2);
        assert!(amount.is_positive());
        assert!((-amount).is_negative());
    }

    #[test]
    fn test_serializes_as_string() {
        let amount = DecimalAmount::new(10000, 2);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"100.00\"");
    }
}
