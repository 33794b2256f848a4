//! Resolution tables
//!
//! For every unit the table records whether converting *to* and *from* that
//! unit multiplies or divides, so the integer path always keeps one operand
//! exact.

use cosim_core::{SimTime, TimeUnit};

use crate::Fixed;

/// Conversion info between the current resolution and one unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConversionInfo {
    /// Multiply when converting a raw value to this unit, otherwise divide
    pub to_mul: bool,
    /// Multiply when converting a value in this unit to raw ticks, otherwise divide
    pub from_mul: bool,
    /// Ratio between this unit and the resolution (a power of ten)
    pub factor: u64,
    /// Fixed-point multiplier for raw -> unit
    pub time_to: Fixed,
    /// Fixed-point multiplier for unit -> raw
    pub time_from: Fixed,
}

impl ConversionInfo {
    fn between(resolution: TimeUnit, unit: TimeUnit) -> Self {
        let shift = unit.power() as i32 - resolution.power() as i32;
        let factor = 10u64.pow(shift.unsigned_abs());

        // shift > 0: `unit` is coarser than the resolution
        let (to_mul, from_mul) = match shift {
            0 => (true, true),
            s if s > 0 => (false, true),
            _ => (true, false),
        };

        let multiplier = |mul: bool| {
            if mul {
                Fixed::from_int(factor as i64)
            } else {
                Fixed::reciprocal(factor)
            }
        };

        ConversionInfo {
            to_mul,
            from_mul,
            factor,
            time_to: multiplier(to_mul),
            time_from: multiplier(from_mul),
        }
    }

    /// Raw ticks -> integer count of this unit (truncating)
    #[inline]
    pub fn to_integer(&self, raw: i64) -> i64 {
        if self.to_mul {
            raw.saturating_mul(self.factor as i64)
        } else {
            raw / self.factor as i64
        }
    }

    /// Integer count of this unit -> raw ticks (truncating)
    #[inline]
    pub fn from_integer(&self, value: i64) -> i64 {
        if self.from_mul {
            value.saturating_mul(self.factor as i64)
        } else {
            value / self.factor as i64
        }
    }

    /// Raw ticks -> fractional count of this unit
    pub fn to_fixed(&self, raw: i64) -> Fixed {
        let value = Fixed::from_int(raw);
        if self.to_mul {
            value.mul(self.time_to)
        } else {
            value.div_int(self.factor)
        }
    }

    /// Fractional count of this unit -> raw ticks, rounded to nearest
    pub fn from_fixed(&self, value: Fixed) -> i64 {
        if self.from_mul {
            value.mul(self.time_from).round()
        } else {
            value.div_int(self.factor).round()
        }
    }
}

/// Conversion tables for one resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    unit: TimeUnit,
    info: [ConversionInfo; 6],
}

impl Resolution {
    pub fn new(unit: TimeUnit) -> Self {
        Resolution {
            unit,
            info: TimeUnit::ALL.map(|target| ConversionInfo::between(unit, target)),
        }
    }

    /// The unit one raw tick stands for
    #[inline]
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    #[inline]
    pub fn info(&self, unit: TimeUnit) -> &ConversionInfo {
        &self.info[unit.index()]
    }

    pub fn to_integer(&self, time: SimTime, unit: TimeUnit) -> i64 {
        self.info(unit).to_integer(time.ticks())
    }

    pub fn from_integer(&self, value: i64, unit: TimeUnit) -> SimTime {
        SimTime::from_ticks(self.info(unit).from_integer(value))
    }

    pub fn to_fixed(&self, time: SimTime, unit: TimeUnit) -> Fixed {
        self.info(unit).to_fixed(time.ticks())
    }

    pub fn from_fixed(&self, value: Fixed, unit: TimeUnit) -> SimTime {
        SimTime::from_ticks(self.info(unit).from_fixed(value))
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::new(TimeUnit::Nanosecond)
    }
}

/// A pending resolution change, applied to every outstanding time value
///
/// Values are converted with the tables of the *old* resolution. Zero and
/// the saturated extremes are left as they are.
#[derive(Clone, Copy, Debug)]
pub struct Rescale {
    from: TimeUnit,
    to: TimeUnit,
    info: ConversionInfo,
}

impl Rescale {
    pub fn new(old: &Resolution, to: TimeUnit) -> Self {
        Rescale {
            from: old.unit(),
            to,
            info: *old.info(to),
        }
    }

    #[inline]
    pub fn from_unit(&self) -> TimeUnit {
        self.from
    }

    #[inline]
    pub fn to_unit(&self) -> TimeUnit {
        self.to
    }

    pub fn apply(&self, time: SimTime) -> SimTime {
        if time.is_sentinel() {
            return time;
        }
        SimTime::from_ticks(self.info.to_integer(time.ticks()))
    }
}

/// Something that owns time values and must follow a rescale
pub trait Rescalable {
    fn rescale(&mut self, rescale: &Rescale);
}

impl Rescalable for SimTime {
    fn rescale(&mut self, rescale: &Rescale) {
        *self = rescale.apply(*self);
    }
}

impl<T: Rescalable> Rescalable for Option<T> {
    fn rescale(&mut self, rescale: &Rescale) {
        if let Some(inner) = self {
            inner.rescale(rescale);
        }
    }
}
