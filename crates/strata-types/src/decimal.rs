//! Arbitrary-precision decimal arithmetic.
//!
//! A [`Dec`] is a big integer scaled by 10^[`PRECISION`], so every value carries
//! exactly 18 fractional digits and has no upper bound. Products and quotients
//! are brought back to that precision in one of two ways:
//!
//! ```text
//! mul, quo                      round half to even at 18 digits
//! mul_truncate, quo_truncate    round toward zero at 18 digits
//! ```
//!
//! Reward ratios and payouts use the truncating forms so that rounding can never
//! pay out more than was accrued.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use num::bigint::BigInt;
use num::traits::{One, Signed, ToPrimitive, Zero};
use num::Integer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TypesError;

/// Number of fractional digits kept by every [`Dec`].
pub const PRECISION: u32 = 18;

fn scale_factor() -> BigInt {
    BigInt::from(10u64.pow(PRECISION))
}

/// `n / d` rounded half to even. `d` must be positive.
fn div_round_half_even(n: &BigInt, d: &BigInt) -> BigInt {
    let (q, r) = n.abs().div_rem(d);
    let twice: BigInt = r * 2u32;
    let q = if twice > *d || (twice == *d && q.is_odd()) {
        q + 1u32
    } else {
        q
    };
    if n.is_negative() {
        -q
    } else {
        q
    }
}

/// Signed decimal with 18 fractional digits.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec(BigInt);

impl Dec {
    pub fn zero() -> Self {
        Dec(BigInt::zero())
    }

    pub fn one() -> Self {
        Dec(scale_factor())
    }

    /// The smallest positive value, 10⁻¹⁸.
    pub fn smallest() -> Self {
        Dec(BigInt::one())
    }

    /// `value × 10^-scale`, e.g. `Dec::with_prec(5, 1)` is `0.5`.
    ///
    /// Scales above [`PRECISION`] are clamped.
    pub fn with_prec(value: i64, scale: u32) -> Self {
        let shift = PRECISION - scale.min(PRECISION);
        Dec(BigInt::from(value) * BigInt::from(10u64.pow(shift)))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    /// Product rounded half-to-even at 18 digits.
    pub fn mul(&self, rhs: &Dec) -> Dec {
        Dec(div_round_half_even(&(&self.0 * &rhs.0), &scale_factor()))
    }

    /// Product truncated toward zero at 18 digits.
    pub fn mul_truncate(&self, rhs: &Dec) -> Dec {
        Dec(&self.0 * &rhs.0 / scale_factor())
    }

    /// Quotient rounded half-to-even at 18 digits. `None` on division by zero.
    pub fn quo(&self, rhs: &Dec) -> Option<Dec> {
        if rhs.is_zero() {
            return None;
        }
        let scale = scale_factor();
        // Divide at 36 digits, then round once back to 18.
        let wide = &self.0 * &scale * &scale / &rhs.0;
        Some(Dec(div_round_half_even(&wide, &scale)))
    }

    /// Quotient truncated toward zero at 18 digits. `None` on division by zero.
    pub fn quo_truncate(&self, rhs: &Dec) -> Option<Dec> {
        if rhs.is_zero() {
            return None;
        }
        Some(Dec(&self.0 * scale_factor() / &rhs.0))
    }

    /// Integer part as an unsigned amount. `None` for negative values or values
    /// that do not fit in `u64`.
    pub fn truncate_u64(&self) -> Option<u64> {
        if self.is_negative() {
            return None;
        }
        (&self.0 / scale_factor()).to_u64()
    }
}

impl From<u64> for Dec {
    fn from(value: u64) -> Self {
        Dec(BigInt::from(value) * scale_factor())
    }
}

impl From<i64> for Dec {
    fn from(value: i64) -> Self {
        Dec(BigInt::from(value) * scale_factor())
    }
}

impl From<i128> for Dec {
    fn from(value: i128) -> Self {
        Dec(BigInt::from(value) * scale_factor())
    }
}

impl Add for Dec {
    type Output = Dec;

    fn add(self, rhs: Dec) -> Dec {
        Dec(self.0 + rhs.0)
    }
}

impl Add<&Dec> for &Dec {
    type Output = Dec;

    fn add(self, rhs: &Dec) -> Dec {
        Dec(&self.0 + &rhs.0)
    }
}

impl Sub for Dec {
    type Output = Dec;

    fn sub(self, rhs: Dec) -> Dec {
        Dec(self.0 - rhs.0)
    }
}

impl Sub<&Dec> for &Dec {
    type Output = Dec;

    fn sub(self, rhs: &Dec) -> Dec {
        Dec(&self.0 - &rhs.0)
    }
}

impl Neg for Dec {
    type Output = Dec;

    fn neg(self) -> Dec {
        Dec(-self.0)
    }
}

impl FromStr for Dec {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| TypesError::InvalidDecimal(format!("{s}: {why}"));
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected digits"));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) || (unsigned.contains('.') && frac.is_empty()) {
            return Err(invalid("expected digits after the point"));
        }
        if frac.len() > PRECISION as usize {
            return Err(invalid(&format!("more than {PRECISION} fractional digits")));
        }
        let digits = format!("{whole}{frac:0<width$}", width = PRECISION as usize);
        let value: BigInt = digits.parse().map_err(|_| invalid("expected digits"))?;
        Ok(Dec(if negative { -value } else { value }))
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, frac) = self.0.abs().div_rem(&scale_factor());
        let sign = if self.0.is_negative() { "-" } else { "" };
        let frac = frac.to_u64().unwrap_or_default();
        if frac == 0 {
            return write!(f, "{sign}{whole}");
        }
        let frac = format!("{frac:018}");
        write!(f, "{sign}{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Dec {
        s.parse().expect("valid decimal")
    }

    #[test]
    fn test_quo_truncate_vs_round() {
        let two = Dec::from(2u64);
        let three = Dec::from(3u64);
        assert_eq!(two.quo(&three), Some(dec("0.666666666666666667")));
        assert_eq!(two.quo_truncate(&three), Some(dec("0.666666666666666666")));
        assert_eq!(Dec::one().quo_truncate(&Dec::zero()), None);
        assert_eq!((-two).quo(&three), Some(dec("-0.666666666666666667")));
    }

    #[test]
    fn test_mul_banker_rounding() {
        let half = Dec::with_prec(5, 1);
        // 7.5e-18 rounds to the even neighbour 8e-18, truncates to 7e-18.
        let x = dec("0.000000000000000015");
        assert_eq!(x.mul(&half), dec("0.000000000000000008"));
        assert_eq!(x.mul_truncate(&half), dec("0.000000000000000007"));
        // 2.5e-18 rounds down to 2e-18.
        let y = dec("0.000000000000000005");
        assert_eq!(y.mul(&half), dec("0.000000000000000002"));
        assert_eq!((-x).mul(&half), dec("-0.000000000000000008"));
    }

    #[test]
    fn test_large_values_keep_full_precision() {
        // Far beyond a 96-bit mantissa: 10^30 × 10^30 with 18 fractional digits.
        let big = Dec::from(1_000_000_000_000_000u64).mul(&Dec::from(1_000_000_000_000_000u64));
        let product = big.mul(&big);
        assert_eq!(product.to_string(), format!("1{}", "0".repeat(60)));
        let third = product.quo_truncate(&Dec::from(3u64)).expect("non-zero");
        assert_eq!(third.to_string(), format!("{}.{}", "3".repeat(60), "3".repeat(18)));
        let max = Dec::from(u64::MAX);
        assert_eq!(max.mul(&max).quo_truncate(&max), Some(max));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("0.0000000000000000001".parse::<Dec>().is_err());
        assert!("abc".parse::<Dec>().is_err());
        assert!("1.".parse::<Dec>().is_err());
        assert!(".5".parse::<Dec>().is_err());
        assert!("1.2.3".parse::<Dec>().is_err());
        assert_eq!(dec("0.02"), Dec::with_prec(2, 2));
        assert_eq!(dec("-7"), Dec::from(-7i64));
    }

    #[test]
    fn test_sign_predicates() {
        assert!(dec("-0.1").is_negative());
        assert!(!Dec::zero().is_negative());
        assert!(!Dec::zero().is_positive());
        assert!(Dec::smallest().is_positive());
    }

    #[test]
    fn test_truncate_u64() {
        assert_eq!(dec("10.999").truncate_u64(), Some(10));
        assert_eq!(dec("0.5").truncate_u64(), Some(0));
        assert_eq!(dec("-1").truncate_u64(), None);
        assert_eq!((Dec::from(u64::MAX) + Dec::one()).truncate_u64(), None);
    }

    #[test]
    fn test_display_normalizes() {
        assert_eq!(Dec::with_prec(500, 3).to_string(), "0.5");
        assert_eq!(Dec::from(25u64).to_string(), "25");
        assert_eq!(dec("-0.25").to_string(), "-0.25");
        assert_eq!(Dec::smallest().to_string(), "0.000000000000000001");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&dec("1.25")).expect("serialize");
        assert_eq!(json, "\"1.25\"");
        let back: Dec = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, dec("1.25"));
        assert!(serde_json::from_str::<Dec>("\"1.2x\"").is_err());
    }
}
