//! Identity types for cosim

use std::fmt;

/// Event identity - strictly increasing in scheduling order
///
/// Two events at the same timestamp fire in ascending `EventId` order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventId(pub u64);

impl EventId {
    pub const ZERO: EventId = EventId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        EventId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// The id following this one
    #[inline]
    pub fn next(self) -> Self {
        EventId(self.0 + 1)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// Application identity - index of a bridge application within its network
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AppId(pub u32);

impl AppId {
    #[inline]
    pub fn new(id: u32) -> Self {
        AppId(id)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Scheduler context the application's events run under
    #[inline]
    pub fn context(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "App({})", self.0)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_ordering() {
        let a = EventId::new(1);
        assert!(a < a.next());
        assert_eq!(a.next().raw(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(EventId::new(7).to_string(), "E#7");
        assert_eq!(format!("{:?}", AppId::new(3)), "App(3)");
    }
}
