//! Fixed-point money type.
//!
//! # Scale
//!
//! All amounts are stored as `i64` micros (1e-6 of a currency unit).  Unit
//! prices from brokerage feeds carry up to three decimals and cost-per-share
//! quotients need more, so the working scale is finer than cents.  Amounts
//! that reach the external ledger are rounded to cents with
//! [`Money::round_to_cents`].
//!
//! # Arithmetic
//!
//! - `Add`, `Sub`, `Neg`, `AddAssign`, `SubAssign` are closed over `Money`.
//! - [`Money::mul_div_round`] computes `self * mul / div` in `i128` with a
//!   single rounding step (half away from zero), so `soldQty * acb / heldQty`
//!   never accumulates binary floating-point drift.
//! - There is no `From<i64>`: callers must say whether a raw integer is
//!   micros ([`Money::new`]) or cents ([`Money::from_cents`]).
//!
//! # Serialization
//!
//! Serialized as a JSON number (`2009.99`) to stay compatible with existing
//! holdings snapshots.  Deserialization accepts numbers or decimal strings.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Micros per currency unit.
pub const MICROS_SCALE: i64 = 1_000_000;

const MICROS_PER_CENT: i64 = 10_000;
const MAX_DECIMALS: usize = 6;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a decimal string could not be converted to [`Money`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    Empty,
    Invalid { raw: String },
    TooManyDecimalPlaces { raw: String },
    Overflow { raw: String },
}

impl fmt::Display for MoneyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "amount is empty"),
            Self::Invalid { raw } => write!(f, "'{raw}' is not a decimal amount"),
            Self::TooManyDecimalPlaces { raw } => {
                write!(f, "'{raw}' has more than {MAX_DECIMALS} decimal places")
            }
            Self::Overflow { raw } => write!(f, "'{raw}' is out of range"),
        }
    }
}

impl std::error::Error for MoneyParseError {}

// ---------------------------------------------------------------------------
// Money newtype
// ---------------------------------------------------------------------------

/// A signed monetary amount at 1e-6 scale.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Construct from raw micros.
    #[inline]
    pub const fn new(micros: i64) -> Self {
        Money(micros)
    }

    /// Construct from whole cents (`-200999` is `-2009.99`).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents * MICROS_PER_CENT)
    }

    /// Underlying micros.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn abs(self) -> Money {
        Money(self.0.saturating_abs())
    }

    #[inline]
    pub fn signum(self) -> i64 {
        self.0.signum()
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `true` when the amount has no fractional part.
    #[inline]
    pub fn is_whole(self) -> bool {
        self.0 % MICROS_SCALE == 0
    }

    /// Whole units, truncated toward zero.
    #[inline]
    pub fn whole_units(self) -> i64 {
        self.0 / MICROS_SCALE
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Round to the nearest cent, half away from zero.
    pub fn round_to_cents(self) -> Money {
        // Dividing by a positive constant cannot fail.
        let cents = div_round_half_away(self.0 as i128, MICROS_PER_CENT as i128).unwrap_or(0);
        Money((cents as i64) * MICROS_PER_CENT)
    }

    /// `round(self * mul / div)` computed in `i128` with one rounding step.
    ///
    /// Returns `None` when `div == 0` or the result does not fit in `i64`.
    pub fn mul_div_round(self, mul: i64, div: i64) -> Option<Money> {
        let n = (self.0 as i128).checked_mul(mul as i128)?;
        let q = div_round_half_away(n, div as i128)?;
        i64::try_from(q).ok().map(Money)
    }

    /// Like [`Money::mul_div_round`] but rounds the result to cents.
    pub fn mul_div_round_cents(self, mul: i64, div: i64) -> Option<Money> {
        let n = (self.0 as i128).checked_mul(mul as i128)?;
        let d = (div as i128).checked_mul(MICROS_PER_CENT as i128)?;
        let cents = div_round_half_away(n, d)?;
        let micros = cents.checked_mul(MICROS_PER_CENT as i128)?;
        i64::try_from(micros).ok().map(Money)
    }

    /// Parse a decimal string such as `-2009.99`, `+10.000` or `.5`.
    ///
    /// Never touches floating point.  More than six decimals is an error
    /// rather than a silent rounding.
    pub fn parse(s: &str) -> Result<Money, MoneyParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyParseError::Empty);
        }
        let invalid = || MoneyParseError::Invalid { raw: s.to_string() };

        let (negative, digits) = if let Some(rest) = s.strip_prefix('-') {
            (true, rest)
        } else if let Some(rest) = s.strip_prefix('+') {
            (false, rest)
        } else {
            (false, s)
        };

        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(invalid());
        }
        if frac_part.len() > MAX_DECIMALS {
            return Err(MoneyParseError::TooManyDecimalPlaces { raw: s.to_string() });
        }

        let overflow = || MoneyParseError::Overflow { raw: s.to_string() };
        let int_val: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let frac_val: i64 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{frac_part:0<width$}", width = MAX_DECIMALS);
            padded.parse().map_err(|_| invalid())?
        };

        let magnitude = int_val
            .checked_mul(MICROS_SCALE)
            .and_then(|v| v.checked_add(frac_val))
            .ok_or_else(overflow)?;
        Ok(Money(if negative { -magnitude } else { magnitude }))
    }

    /// Nearest `f64`; exact enough for any amount below ~9e9 units.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / MICROS_SCALE as f64
    }

    /// Convert from `f64`, rounding to the nearest micro.
    pub fn from_f64(v: f64) -> Option<Money> {
        if !v.is_finite() {
            return None;
        }
        let scaled = (v * MICROS_SCALE as f64).round();
        if scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
            return None;
        }
        Some(Money(scaled as i64))
    }
}

/// `n / d` rounded half away from zero.  `None` when `d == 0`.
fn div_round_half_away(n: i128, d: i128) -> Option<i128> {
    if d == 0 {
        return None;
    }
    let (n, d) = if d < 0 { (-n, -d) } else { (n, d) };
    let q = n / d;
    let r = n % d;
    if r.abs() * 2 >= d {
        Some(q + n.signum())
    } else {
        Some(q)
    }
}

// ---------------------------------------------------------------------------
// Arithmetic operators
// ---------------------------------------------------------------------------

impl Add for Money {
    type Output = Money;
    #[inline]
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    #[inline]
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    #[inline]
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Display: shortest decimal form ("10", "-2009.99", "0.04")
// ---------------------------------------------------------------------------

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MICROS_SCALE as u64;
        let frac = abs % MICROS_SCALE as u64;
        if frac == 0 {
            return write!(f, "{sign}{whole}");
        }
        let digits = format!("{frac:06}");
        write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount as a number or string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(MICROS_SCALE)
            .map(Money)
            .ok_or_else(|| E::custom(format!("amount {v} out of range")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(format!("amount {v} out of range")))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Money::from_f64(v).ok_or_else(|| E::custom(format!("amount {v} out of range")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn parse_two_decimal_places() {
        assert_eq!(m("-2009.99"), Money::from_cents(-200_999));
        assert_eq!(m("1990.01"), Money::from_cents(199_001));
    }

    #[test]
    fn parse_accepts_sign_and_leading_dot() {
        assert_eq!(m("+10.000"), Money::new(10 * MICROS_SCALE));
        assert_eq!(m(".5"), Money::new(500_000));
        assert_eq!(m("  0.04 "), Money::from_cents(4));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Money::parse(""), Err(MoneyParseError::Empty));
        assert!(matches!(Money::parse("abc"), Err(MoneyParseError::Invalid { .. })));
        assert!(matches!(Money::parse("1.2.3"), Err(MoneyParseError::Invalid { .. })));
        assert!(matches!(Money::parse("-"), Err(MoneyParseError::Invalid { .. })));
        assert!(matches!(
            Money::parse("1.1234567"),
            Err(MoneyParseError::TooManyDecimalPlaces { .. })
        ));
    }

    #[test]
    fn display_is_shortest_decimal() {
        assert_eq!(m("10.000").to_string(), "10");
        assert_eq!(m("-2009.99").to_string(), "-2009.99");
        assert_eq!(m("0.04").to_string(), "0.04");
        assert_eq!(m("-0.5").to_string(), "-0.5");
        assert_eq!(Money::ZERO.to_string(), "0");
    }

    #[test]
    fn cent_subtraction_is_exact() {
        // 0.03 - 0.02 must be exactly one cent.
        assert_eq!(m("0.03") - m("0.02"), Money::from_cents(1));
    }

    #[test]
    fn round_to_cents_half_away_from_zero() {
        assert_eq!(Money::new(12_345).round_to_cents(), Money::from_cents(1));
        assert_eq!(Money::new(15_000).round_to_cents(), Money::from_cents(2));
        assert_eq!(Money::new(-15_000).round_to_cents(), Money::from_cents(-2));
        assert_eq!(Money::new(14_999).round_to_cents(), Money::from_cents(1));
    }

    #[test]
    fn mul_div_round_single_rounding_step() {
        // 1/3 of 10.00 -> 3.333333 micros-rounded, 3.33 cents-rounded
        let acb = m("10");
        assert_eq!(acb.mul_div_round(1, 3), Some(Money::new(3_333_333)));
        assert_eq!(acb.mul_div_round_cents(1, 3), Some(Money::from_cents(333)));
        assert_eq!(acb.mul_div_round_cents(2, 3), Some(Money::from_cents(667)));
        assert_eq!(acb.mul_div_round(1, 0), None);
    }

    #[test]
    fn json_number_roundtrip_is_exact() {
        let v = m("2009.99");
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "2009.99");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn deserialize_accepts_integer_and_string() {
        let a: Money = serde_json::from_str("100").unwrap();
        assert_eq!(a, Money::new(100 * MICROS_SCALE));
        let b: Money = serde_json::from_str("\"-1009.99\"").unwrap();
        assert_eq!(b, Money::from_cents(-100_999));
    }
}
