//! Time primitives for cosim
//!
//! A `SimTime` is a raw tick count in the current resolution of the owning
//! clock. It carries no unit; converting to and from calendar units is the
//! job of the clock that knows the resolution.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CosimError;

/// Simulation time value - signed tick count in the current resolution
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(pub i64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);
    pub const MAX: SimTime = SimTime(i64::MAX);
    pub const MIN: SimTime = SimTime(i64::MIN);

    /// Wrap a raw tick count
    #[inline]
    pub fn from_ticks(ticks: i64) -> Self {
        SimTime(ticks)
    }

    /// Raw tick count in the current resolution
    #[inline]
    pub fn ticks(self) -> i64 {
        self.0
    }

    /// Three-way comparison: -1, 0 or 1
    #[inline]
    pub fn compare(self, other: SimTime) -> i32 {
        match self.0.cmp(&other.0) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_strictly_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_strictly_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn abs(self) -> Self {
        SimTime(self.0.saturating_abs())
    }

    /// Sentinel values survive a rescale unchanged
    #[inline]
    pub fn is_sentinel(self) -> bool {
        self.0 == 0 || self.0 == i64::MIN || self.0 == i64::MAX
    }

    #[inline]
    pub fn checked_add(self, rhs: SimTime) -> Option<Self> {
        self.0.checked_add(rhs.0).map(SimTime)
    }

    #[inline]
    pub fn saturating_add(self, rhs: SimTime) -> Self {
        SimTime(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: SimTime) -> Self {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl Add for SimTime {
    type Output = SimTime;

    #[inline]
    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0 + rhs.0)
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    #[inline]
    fn sub(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0 - rhs.0)
    }
}

impl AddAssign for SimTime {
    #[inline]
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl SubAssign for SimTime {
    #[inline]
    fn sub_assign(&mut self, rhs: SimTime) {
        self.0 -= rhs.0;
    }
}

impl Neg for SimTime {
    type Output = SimTime;

    #[inline]
    fn neg(self) -> Self::Output {
        SimTime(-self.0)
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t({})", self.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

/// Calendar unit a time value can be expressed in, coarse to fine
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "s")]
    Second,
    #[serde(rename = "ms")]
    Millisecond,
    #[serde(rename = "us")]
    Microsecond,
    #[serde(rename = "ns")]
    Nanosecond,
    #[serde(rename = "ps")]
    Picosecond,
    #[serde(rename = "fs")]
    Femtosecond,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 6] = [
        TimeUnit::Second,
        TimeUnit::Millisecond,
        TimeUnit::Microsecond,
        TimeUnit::Nanosecond,
        TimeUnit::Picosecond,
        TimeUnit::Femtosecond,
    ];

    /// Number of femtosecond decades in one tick of this unit
    #[inline]
    pub fn power(self) -> u32 {
        match self {
            TimeUnit::Second => 15,
            TimeUnit::Millisecond => 12,
            TimeUnit::Microsecond => 9,
            TimeUnit::Nanosecond => 6,
            TimeUnit::Picosecond => 3,
            TimeUnit::Femtosecond => 0,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Suffix used in duration strings
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Second => "s",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Microsecond => "us",
            TimeUnit::Nanosecond => "ns",
            TimeUnit::Picosecond => "ps",
            TimeUnit::Femtosecond => "fs",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        TimeUnit::ALL.into_iter().find(|u| u.suffix() == suffix)
    }
}

impl Default for TimeUnit {
    fn default() -> Self {
        TimeUnit::Nanosecond
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for TimeUnit {
    type Err = CosimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeUnit::from_suffix(s).ok_or_else(|| CosimError::InvalidDuration(s.to_string()))
    }
}
