//! I80F48 binary fixed-point numbers
//!
//! On-chain fractional values (fees, funding, liquidation prices) are stored
//! as a signed 128-bit integer with 48 fractional bits:
//!
//! ```text
//! value = raw / 2^48
//! ```
//!
//! Addition, subtraction and comparison work directly on `raw`. Multiply and
//! divide go through a 256-bit intermediate so no bits are lost before the
//! final shift; a result that does not fit back into 128 bits is reported as
//! [`FixedPointError::Overflow`].

use std::cmp::Ordering;
use std::fmt;

use ruint::aliases::U256;

use crate::core::errors::FixedPointError;

/// Number of fractional bits
pub const FRAC_BITS: u32 = 48;

/// Raw value of 1.0
pub const ONE_RAW: i128 = 1 << FRAC_BITS;

const FRAC_MASK: u64 = (1u64 << FRAC_BITS) - 1;

/// Signed fixed-point with 80 integer bits and 48 fractional bits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct I80F48(i128);

impl I80F48 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(ONE_RAW);
    pub const MAX: Self = Self(i128::MAX);
    pub const MIN: Self = Self(i128::MIN);

    /// Wrap raw bits as read from an account
    #[inline]
    pub const fn from_bits(raw: i128) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn to_bits(self) -> i128 {
        self.0
    }

    /// Exact conversion from an integer, which always fits in 80 bits
    #[inline]
    pub const fn from_int(value: i64) -> Self {
        Self((value as i128) << FRAC_BITS)
    }

    /// Nearest representable value, `None` for NaN, infinities and out of range
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * ONE_RAW as f64).round();
        // 2^127 is exactly representable; anything at or beyond it overflows
        if scaled >= 2f64.powi(127) || scaled < -(2f64.powi(127)) {
            return None;
        }
        Some(Self(scaled as i128))
    }

    /// Display value: raw divided by 2^48
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / ONE_RAW as f64
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(self.overflow("add", rhs))
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(self.overflow("sub", rhs))
    }

    pub fn checked_neg(self) -> Result<Self, FixedPointError> {
        self.0
            .checked_neg()
            .map(Self)
            .ok_or(self.overflow("neg", Self::ZERO))
    }

    /// Multiply, rounding toward negative infinity
    pub fn checked_mul(self, rhs: Self) -> Result<Self, FixedPointError> {
        let negative = (self.0 < 0) != (rhs.0 < 0);
        let product = widen(self.0.unsigned_abs()) * widen(rhs.0.unsigned_abs());

        let mut magnitude = product >> FRAC_BITS as usize;
        if negative && product.as_limbs()[0] & FRAC_MASK != 0 {
            magnitude += U256::from_limbs([1, 0, 0, 0]);
        }

        narrow(magnitude, negative).ok_or(self.overflow("mul", rhs))
    }

    /// Divide, truncating toward zero
    pub fn checked_div(self, rhs: Self) -> Result<Self, FixedPointError> {
        if rhs.0 == 0 {
            return Err(FixedPointError::DivisionByZero);
        }
        let negative = (self.0 < 0) != (rhs.0 < 0);
        let numerator = widen(self.0.unsigned_abs()) << FRAC_BITS as usize;
        let magnitude = numerator / widen(rhs.0.unsigned_abs());

        narrow(magnitude, negative).ok_or(self.overflow("div", rhs))
    }

    fn overflow(self, op: &'static str, rhs: Self) -> FixedPointError {
        FixedPointError::Overflow {
            op,
            lhs: self.0,
            rhs: rhs.0,
        }
    }
}

#[inline]
fn widen(value: u128) -> U256 {
    U256::from_limbs([value as u64, (value >> 64) as u64, 0, 0])
}

/// Apply the sign and fit the magnitude back into an i128
fn narrow(magnitude: U256, negative: bool) -> Option<I80F48> {
    let limbs = magnitude.as_limbs();
    if limbs[2] != 0 || limbs[3] != 0 {
        return None;
    }
    let value = (limbs[1] as u128) << 64 | limbs[0] as u128;

    if negative {
        if value == i128::MIN.unsigned_abs() {
            Some(I80F48(i128::MIN))
        } else {
            i128::try_from(value).ok().map(|v| I80F48(-v))
        }
    } else {
        i128::try_from(value).ok().map(I80F48)
    }
}

impl PartialOrd for I80F48 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for I80F48 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for I80F48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*}", p, self.to_f64()),
            None => write!(f, "{}", self.to_f64()),
        }
    }
}

impl fmt::Debug for I80F48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I80F48({} raw={})", self.to_f64(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fx(v: f64) -> I80F48 {
        I80F48::from_f64(v).unwrap()
    }

    #[test]
    fn test_one_is_two_pow_48() {
        assert_eq!(I80F48::ONE.to_bits(), 281_474_976_710_656);
        assert_eq!(I80F48::from_int(1), I80F48::ONE);
        assert_eq!(I80F48::ONE.to_f64(), 1.0);
    }

    #[test]
    fn test_to_f64_fractional() {
        assert_eq!(I80F48::from_bits(ONE_RAW / 2).to_f64(), 0.5);
        assert_eq!(I80F48::from_bits(-ONE_RAW / 4).to_f64(), -0.25);
    }

    #[test]
    fn test_add_sub() {
        let a = fx(1.5);
        let b = fx(2.25);
        assert_eq!(a.checked_add(b).unwrap(), fx(3.75));
        assert_eq!(a.checked_sub(b).unwrap(), fx(-0.75));
    }

    #[test]
    fn test_add_overflow_reported() {
        let err = I80F48::MAX.checked_add(I80F48::from_bits(1)).unwrap_err();
        assert!(matches!(err, FixedPointError::Overflow { op: "add", .. }));
    }

    #[test]
    fn test_mul_exact() {
        assert_eq!(fx(1.5).checked_mul(fx(2.0)).unwrap(), fx(3.0));
        assert_eq!(fx(-1.5).checked_mul(fx(2.0)).unwrap(), fx(-3.0));
        assert_eq!(fx(-0.5).checked_mul(fx(-0.5)).unwrap(), fx(0.25));
    }

    #[test]
    fn test_mul_keeps_precision_past_64_bits() {
        // Both operands have raw values above 2^64, so a 128-bit product would overflow
        let a = I80F48::from_int(1 << 20);
        let b = I80F48::from_int(1 << 30);
        assert_eq!(a.checked_mul(b).unwrap(), I80F48::from_int(1 << 50));
    }

    #[test]
    fn test_mul_rounds_toward_negative_infinity() {
        let tiny = I80F48::from_bits(1);
        let half = fx(0.5);
        assert_eq!(tiny.checked_mul(half).unwrap().to_bits(), 0);
        assert_eq!(tiny.checked_neg().unwrap().checked_mul(half).unwrap().to_bits(), -1);
    }

    #[test]
    fn test_mul_overflow_reported() {
        let big = I80F48::from_int(i64::MAX);
        let err = big.checked_mul(big).unwrap_err();
        assert!(matches!(err, FixedPointError::Overflow { op: "mul", .. }));
    }

    #[test]
    fn test_div() {
        assert_eq!(fx(3.0).checked_div(fx(2.0)).unwrap(), fx(1.5));
        assert_eq!(fx(-3.0).checked_div(fx(2.0)).unwrap(), fx(-1.5));
        assert_relative_eq!(
            fx(1.0).checked_div(fx(3.0)).unwrap().to_f64(),
            1.0 / 3.0,
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_div_by_zero() {
        assert_eq!(
            fx(1.0).checked_div(I80F48::ZERO),
            Err(FixedPointError::DivisionByZero)
        );
    }

    #[test]
    fn test_div_overflow_reported() {
        let err = I80F48::MAX.checked_div(I80F48::from_bits(1)).unwrap_err();
        assert!(matches!(err, FixedPointError::Overflow { op: "div", .. }));
    }

    #[test]
    fn test_min_survives_mul_by_one() {
        assert_eq!(I80F48::MIN.checked_mul(I80F48::ONE).unwrap(), I80F48::MIN);
    }

    #[test]
    fn test_ordering_matches_value() {
        let mut values = vec![fx(2.0), fx(-1.0), fx(0.5), I80F48::ZERO, fx(-0.25)];
        values.sort();
        let as_f64: Vec<f64> = values.iter().map(|v| v.to_f64()).collect();
        assert_eq!(as_f64, vec![-1.0, -0.25, 0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_from_f64_rejects_non_finite() {
        assert!(I80F48::from_f64(f64::NAN).is_none());
        assert!(I80F48::from_f64(f64::INFINITY).is_none());
        assert!(I80F48::from_f64(1e40).is_none());
    }

    #[test]
    fn test_display_precision() {
        assert_eq!(format!("{:.2}", fx(1.5)), "1.50");
        assert_eq!(format!("{}", fx(-0.25)), "-0.25");
    }
}
