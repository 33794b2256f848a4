//! Virtual clock for cosim
//!
//! The clock owns the resolution, the current simulation time and the
//! registry of live time values. The resolution can change exactly once,
//! and only before the simulation starts: the registry is what makes the
//! rescale possible and it is discarded by the first rescale or by `seal`.

use std::fmt;

use cosim_core::{CosimError, CosimResult, SimTime, TimeUnit};

use crate::{parse_duration, Fixed, LiveSlot, Rescalable, Rescale, Resolution, TimeRegistry};

/// Virtual simulation clock
/// INVARIANT: `now` never decreases
#[derive(Debug)]
pub struct VirtualClock {
    resolution: Resolution,
    now: SimTime,
    registry: TimeRegistry,
}

impl VirtualClock {
    /// Create a clock at time zero with nanosecond resolution
    pub fn new() -> Self {
        VirtualClock {
            resolution: Resolution::default(),
            now: SimTime::ZERO,
            registry: TimeRegistry::new(),
        }
    }

    /// Current resolution
    pub fn resolution(&self) -> TimeUnit {
        self.resolution.unit()
    }

    /// Change the resolution, rewriting every tracked value
    ///
    /// Returns the applied `Rescale` so owners of untracked values (event
    /// queues, horizons) can follow. Fails once the registry is gone.
    pub fn set_resolution(&mut self, unit: TimeUnit) -> CosimResult<Rescale> {
        if self.registry.is_discarded() {
            return Err(CosimError::ResolutionLocked {
                current: self.resolution.unit(),
                requested: unit,
            });
        }

        let rescale = Rescale::new(&self.resolution, unit);
        self.registry.rescale(&rescale);
        self.now.rescale(&rescale);
        self.resolution = Resolution::new(unit);
        self.registry.discard();

        tracing::info!(
            from = %rescale.from_unit(),
            to = %rescale.to_unit(),
            live = self.registry.len(),
            "Time resolution changed"
        );

        Ok(rescale)
    }

    /// Discard the registry without rescaling; the resolution is final
    pub fn seal(&mut self) {
        if !self.registry.is_discarded() {
            tracing::debug!(unit = %self.resolution.unit(), "Time resolution sealed");
            self.registry.discard();
        }
    }

    /// True once the resolution can no longer change
    pub fn is_sealed(&self) -> bool {
        self.registry.is_discarded()
    }

    /// Get current simulation time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the clock forward to `target`
    pub fn advance_to(&mut self, target: SimTime) -> CosimResult<()> {
        if target < self.now {
            return Err(CosimError::TimeRegression {
                now: self.now,
                target,
            });
        }
        self.now = target;
        Ok(())
    }

    // Live values

    pub fn track(&mut self, value: SimTime) -> LiveSlot {
        self.registry.track(value)
    }

    pub fn live(&self, slot: LiveSlot) -> CosimResult<SimTime> {
        self.registry
            .get(slot)
            .ok_or(CosimError::UnknownSlot(slot.raw()))
    }

    pub fn set_live(&mut self, slot: LiveSlot, value: SimTime) -> CosimResult<()> {
        self.registry.set(slot, value)
    }

    pub fn release(&mut self, slot: LiveSlot) -> Option<SimTime> {
        self.registry.release(slot)
    }

    pub fn live_count(&self) -> usize {
        self.registry.len()
    }

    // Conversions

    pub fn from_integer(&self, value: i64, unit: TimeUnit) -> SimTime {
        self.resolution.from_integer(value, unit)
    }

    pub fn to_integer(&self, time: SimTime, unit: TimeUnit) -> i64 {
        self.resolution.to_integer(time, unit)
    }

    /// Convert to `unit`, rounding up so the result never undershoots `time`
    pub fn to_integer_ceil(&self, time: SimTime, unit: TimeUnit) -> i64 {
        let info = self.resolution.info(unit);
        if info.to_mul {
            return info.to_integer(time.ticks());
        }
        let factor = info.factor as i64;
        let q = time.ticks() / factor;
        if time.ticks() % factor > 0 {
            q + 1
        } else {
            q
        }
    }

    pub fn from_fixed(&self, value: Fixed, unit: TimeUnit) -> SimTime {
        self.resolution.from_fixed(value, unit)
    }

    pub fn to_fixed(&self, time: SimTime, unit: TimeUnit) -> Fixed {
        self.resolution.to_fixed(time, unit)
    }

    pub fn from_f64(&self, value: f64, unit: TimeUnit) -> SimTime {
        self.from_fixed(Fixed::from_f64(value), unit)
    }

    pub fn to_f64(&self, time: SimTime, unit: TimeUnit) -> f64 {
        self.to_fixed(time, unit).to_f64()
    }

    /// Approximate value in seconds, for logging
    pub fn seconds(&self, time: SimTime) -> f64 {
        self.to_f64(time, TimeUnit::Second)
    }

    /// Parse a duration string such as `"1.5ms"`
    pub fn parse(&self, text: &str) -> CosimResult<SimTime> {
        parse_duration(text, &self.resolution)
    }

    pub fn compare(&self, a: SimTime, b: SimTime) -> i32 {
        a.compare(b)
    }

    /// Render a value with its resolution suffix, e.g. `+1500000ns`
    pub fn display(&self, time: SimTime) -> TimeDisplay {
        TimeDisplay {
            time,
            unit: self.resolution.unit(),
        }
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

/// A time value paired with the unit its ticks are in
#[derive(Clone, Copy, Debug)]
pub struct TimeDisplay {
    time: SimTime,
    unit: TimeUnit,
}

impl fmt::Display for TimeDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.time, self.unit)
    }
}
