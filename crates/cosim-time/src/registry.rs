//! Live time value registry
//!
//! Time values that live outside the scheduler (configuration delays,
//! application timers) are tracked here so the one-time rescale can rewrite
//! them. Once discarded the registry keeps its slots readable but can never
//! rescale again.

use std::collections::HashMap;

use cosim_core::{CosimError, CosimResult, SimTime};

use crate::{Rescalable, Rescale};

/// Handle to a tracked time value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiveSlot(u64);

impl LiveSlot {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct TimeRegistry {
    slots: HashMap<LiveSlot, SimTime>,
    next_slot: u64,
    discarded: bool,
}

impl TimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a value
    pub fn track(&mut self, value: SimTime) -> LiveSlot {
        let slot = LiveSlot(self.next_slot);
        self.next_slot += 1;
        self.slots.insert(slot, value);
        slot
    }

    pub fn get(&self, slot: LiveSlot) -> Option<SimTime> {
        self.slots.get(&slot).copied()
    }

    pub fn set(&mut self, slot: LiveSlot, value: SimTime) -> CosimResult<()> {
        match self.slots.get_mut(&slot) {
            Some(stored) => {
                *stored = value;
                Ok(())
            }
            None => Err(CosimError::UnknownSlot(slot.0)),
        }
    }

    /// Stop tracking a value, returning its last state
    pub fn release(&mut self, slot: LiveSlot) -> Option<SimTime> {
        self.slots.remove(&slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True once no further rescale is possible
    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    pub fn discard(&mut self) {
        self.discarded = true;
    }
}

impl Rescalable for TimeRegistry {
    fn rescale(&mut self, rescale: &Rescale) {
        if self.discarded {
            return;
        }
        for value in self.slots.values_mut() {
            value.rescale(rescale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resolution;
    use cosim_core::TimeUnit;

    #[test]
    fn test_track_and_release() {
        let mut reg = TimeRegistry::new();
        let a = reg.track(SimTime(10));
        let b = reg.track(SimTime(20));

        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(a), Some(SimTime(10)));

        reg.set(b, SimTime(25)).unwrap();
        assert_eq!(reg.release(b), Some(SimTime(25)));
        assert_eq!(reg.get(b), None);
        assert_eq!(reg.set(b, SimTime(1)), Err(CosimError::UnknownSlot(b.raw())));
    }

    #[test]
    fn test_discarded_registry_ignores_rescale() {
        let mut reg = TimeRegistry::new();
        let slot = reg.track(SimTime(4_000));
        let rescale = Rescale::new(&Resolution::default(), TimeUnit::Microsecond);

        reg.rescale(&rescale);
        assert_eq!(reg.get(slot), Some(SimTime(4)));

        reg.discard();
        reg.rescale(&rescale);
        assert_eq!(reg.get(slot), Some(SimTime(4)));
    }
}
