//! 64.64 fixed-point numbers
//!
//! Fractional conversions between units go through this type instead of
//! `f64` so long runs do not accumulate rounding error.

use std::fmt;

const FRAC_BITS: u32 = 64;
const ONE: i128 = 1 << FRAC_BITS;
const LOW_MASK: u128 = u64::MAX as u128;

/// Signed fixed-point value with 64 integer and 64 fractional bits
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed(i128);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(ONE);

    #[inline]
    pub fn from_int(value: i64) -> Self {
        Fixed((value as i128) << FRAC_BITS)
    }

    /// `numerator / denominator`, truncated to 64 fractional bits
    pub fn from_ratio(numerator: i128, denominator: i128) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        numerator
            .checked_mul(ONE)
            .map(|scaled| Fixed(scaled / denominator))
    }

    /// Exact reciprocal of an integer factor (to 64 fractional bits)
    #[inline]
    pub fn reciprocal(factor: u64) -> Self {
        Fixed(ONE / factor as i128)
    }

    pub fn from_f64(value: f64) -> Self {
        // `as` saturates on out-of-range floats and maps NaN to zero
        Fixed((value * ONE as f64) as i128)
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / ONE as f64
    }

    #[inline]
    pub fn raw(self) -> i128 {
        self.0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn mul_int(self, factor: u64) -> Self {
        Fixed(self.0.saturating_mul(factor as i128))
    }

    #[inline]
    pub fn div_int(self, factor: u64) -> Self {
        Fixed(self.0 / factor as i128)
    }

    /// Full-precision product, saturating on overflow
    pub fn mul(self, rhs: Fixed) -> Self {
        let negative = (self.0 < 0) != (rhs.0 < 0);
        let a = self.0.unsigned_abs();
        let b = rhs.0.unsigned_abs();

        let (a_hi, a_lo) = (a >> FRAC_BITS, a & LOW_MASK);
        let (b_hi, b_lo) = (b >> FRAC_BITS, b & LOW_MASK);

        // (a * b) >> 64, split so no partial product exceeds 128 bits
        let magnitude = a_hi
            .checked_mul(b_hi)
            .and_then(|hh| hh.checked_mul(1u128 << FRAC_BITS))
            .and_then(|hh| hh.checked_add(a_hi * b_lo))
            .and_then(|acc| acc.checked_add(a_lo * b_hi))
            .and_then(|acc| acc.checked_add((a_lo * b_lo) >> FRAC_BITS))
            .and_then(|acc| i128::try_from(acc).ok());

        match (magnitude, negative) {
            (Some(m), false) => Fixed(m),
            (Some(m), true) => Fixed(-m),
            (None, false) => Fixed(i128::MAX),
            (None, true) => Fixed(i128::MIN),
        }
    }

    /// Integer part, truncated toward zero and clamped to `i64`
    pub fn trunc(self) -> i64 {
        clamp_i64(self.0 / ONE)
    }

    /// Nearest integer, ties away from zero, clamped to `i64`
    pub fn round(self) -> i64 {
        let half = ONE / 2;
        let biased = if self.0 < 0 {
            self.0.saturating_sub(half)
        } else {
            self.0.saturating_add(half)
        };
        clamp_i64(biased / ONE)
    }
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({})", self.to_f64())
    }
}
