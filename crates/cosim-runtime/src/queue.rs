//! Event queue with lazy cancellation
//!
//! Events are ordered by `(timestamp, id)`. Ids increase in insertion order,
//! so events sharing a timestamp fire first-in first-out. Cancelling only
//! drops the payload; the heap key stays behind as an inert entry and is
//! purged when it reaches the head.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use cosim_core::{EventId, SimTime};
use cosim_time::{Rescalable, Rescale};

/// Below this many heap keys compaction is never worth it
const COMPACT_MIN_KEYS: usize = 1024;

/// Handle to a scheduled event
///
/// Cancellation goes by `id`; `timestamp` is the time the event was
/// scheduled for and is not updated by a rescale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle {
    pub id: EventId,
    pub timestamp: SimTime,
}

/// The head of the queue, without its payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventView {
    pub handle: EventHandle,
    pub context: u32,
}

/// An event removed from the queue
#[derive(Debug)]
pub struct ScheduledEvent<P> {
    pub handle: EventHandle,
    pub context: u32,
    pub payload: P,
}

impl<P> ScheduledEvent<P> {
    #[inline]
    pub fn timestamp(&self) -> SimTime {
        self.handle.timestamp
    }
}

#[derive(Debug)]
struct Entry<P> {
    timestamp: SimTime,
    context: u32,
    payload: P,
}

/// Priority queue of pending events
#[derive(Debug)]
pub struct EventQueue<P> {
    heap: BinaryHeap<Reverse<(SimTime, EventId)>>,
    live: HashMap<EventId, Entry<P>>,
    next_id: EventId,
}

impl<P> EventQueue<P> {
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_id: EventId::ZERO,
        }
    }

    /// Schedule `payload` at `timestamp`
    pub fn insert(&mut self, timestamp: SimTime, context: u32, payload: P) -> EventHandle {
        let id = self.next_id;
        self.next_id = id.next();

        self.heap.push(Reverse((timestamp, id)));
        self.live.insert(
            id,
            Entry {
                timestamp,
                context,
                payload,
            },
        );

        EventHandle { id, timestamp }
    }

    /// Lowest live event, purging inert entries in front of it
    pub fn peek_min(&mut self) -> Option<EventView> {
        self.purge_inert_head();
        let Reverse((timestamp, id)) = *self.heap.peek()?;
        let entry = self.live.get(&id)?;
        Some(EventView {
            handle: EventHandle { id, timestamp },
            context: entry.context,
        })
    }

    /// Timestamp of the lowest live event
    pub fn next_time(&mut self) -> Option<SimTime> {
        self.peek_min().map(|view| view.handle.timestamp)
    }

    /// Remove and return the lowest live event
    pub fn pop_min(&mut self) -> Option<ScheduledEvent<P>> {
        while let Some(Reverse((timestamp, id))) = self.heap.pop() {
            if let Some(entry) = self.live.remove(&id) {
                return Some(ScheduledEvent {
                    handle: EventHandle { id, timestamp },
                    context: entry.context,
                    payload: entry.payload,
                });
            }
        }
        None
    }

    /// Cancel a pending event
    ///
    /// Unknown, already fired and already cancelled handles are ignored.
    /// Returns whether an event was actually cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        let cancelled = self.live.remove(&handle.id).is_some();
        if cancelled && self.heap.len() >= COMPACT_MIN_KEYS && self.heap.len() > 2 * self.live.len()
        {
            self.compact();
        }
        cancelled
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of live events
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Number of heap entries, inert ones included
    pub fn capacity_used(&self) -> usize {
        self.heap.len()
    }

    /// Rebuild the heap from live entries only
    pub fn compact(&mut self) {
        let before = self.heap.len();
        self.heap = self
            .live
            .iter()
            .map(|(id, entry)| Reverse((entry.timestamp, *id)))
            .collect();
        tracing::trace!(before, after = self.heap.len(), "Event queue compacted");
    }

    fn purge_inert_head(&mut self) {
        while let Some(Reverse((_, id))) = self.heap.peek() {
            if self.live.contains_key(id) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<P> Default for EventQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Rescalable for EventQueue<P> {
    /// Rewrite every timestamp; ids keep the FIFO order of events that
    /// become equal under a coarser resolution
    fn rescale(&mut self, rescale: &Rescale) {
        for entry in self.live.values_mut() {
            entry.timestamp.rescale(rescale);
        }
        self.compact();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_core::TimeUnit;
    use cosim_time::Resolution;
    use proptest::prelude::*;

    fn drain<P>(queue: &mut EventQueue<P>) -> Vec<P> {
        std::iter::from_fn(|| queue.pop_min().map(|e| e.payload)).collect()
    }

    #[test]
    fn test_orders_by_timestamp_then_insertion() {
        let mut queue = EventQueue::new();
        queue.insert(SimTime(30), 0, "c");
        queue.insert(SimTime(10), 0, "a1");
        queue.insert(SimTime(20), 0, "b");
        queue.insert(SimTime(10), 0, "a2");

        assert_eq!(queue.next_time(), Some(SimTime(10)));
        assert_eq!(drain(&mut queue), ["a1", "a2", "b", "c"]);
        assert!(queue.pop_min().is_none());
    }

    #[test]
    fn test_cancel_is_lazy_and_idempotent() {
        let mut queue = EventQueue::new();
        let a = queue.insert(SimTime(1), 0, "a");
        let b = queue.insert(SimTime(2), 7, "b");

        assert!(queue.cancel(a));
        assert!(!queue.cancel(a));
        assert!(!queue.is_pending(a));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.capacity_used(), 2);

        let head = queue.peek_min().unwrap();
        assert_eq!(head.handle, b);
        assert_eq!(head.context, 7);
        assert_eq!(queue.capacity_used(), 1);

        let fired = queue.pop_min().unwrap();
        assert_eq!(fired.handle, b);
        assert!(!queue.cancel(b));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_compact_drops_inert_entries() {
        let mut queue = EventQueue::new();
        let handles: Vec<_> = (0..10).map(|i| queue.insert(SimTime(i), 0, i)).collect();
        for h in &handles[..8] {
            queue.cancel(*h);
        }
        assert_eq!(queue.capacity_used(), 10);

        queue.compact();
        assert_eq!(queue.capacity_used(), 2);
        assert_eq!(drain(&mut queue), [8, 9]);
    }

    #[test]
    fn test_heavy_cancellation_compacts() {
        let mut queue = EventQueue::new();
        let handles: Vec<_> = (0..4 * COMPACT_MIN_KEYS as i64)
            .map(|i| queue.insert(SimTime(i), 0, ()))
            .collect();
        for h in &handles {
            queue.cancel(*h);
        }
        assert!(queue.capacity_used() < COMPACT_MIN_KEYS);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rescale_merges_timestamps_in_fifo_order() {
        let mut queue = EventQueue::new();
        queue.insert(SimTime(1_900), 0, "late");
        queue.insert(SimTime(1_100), 0, "early");

        let rescale = Rescale::new(&Resolution::default(), TimeUnit::Microsecond);
        queue.rescale(&rescale);

        let first = queue.pop_min().unwrap();
        assert_eq!(first.payload, "late");
        assert_eq!(first.timestamp(), SimTime(1));
        assert_eq!(queue.pop_min().unwrap().payload, "early");
    }

    proptest! {
        #[test]
        fn fires_in_timestamp_then_fifo_order(times in prop::collection::vec(0i64..50, 0..200)) {
            let mut queue = EventQueue::new();
            for (i, t) in times.iter().enumerate() {
                queue.insert(SimTime(*t), 0, i);
            }

            let fired = drain(&mut queue);
            let mut expected: Vec<usize> = (0..times.len()).collect();
            expected.sort_by_key(|i| (times[*i], *i));
            prop_assert_eq!(fired, expected);
        }

        #[test]
        fn cancelled_events_never_fire(
            times in prop::collection::vec(0i64..50, 1..100),
            cancel_mask in prop::collection::vec(any::<bool>(), 100),
            fire_first in 0usize..20,
        ) {
            let mut queue = EventQueue::new();
            let handles: Vec<_> = times
                .iter()
                .enumerate()
                .map(|(i, t)| queue.insert(SimTime(*t), 0, i))
                .collect();

            let mut fired = Vec::new();
            for _ in 0..fire_first {
                if let Some(e) = queue.pop_min() {
                    fired.push(e.payload);
                }
            }
            let observed = fired.clone();

            let mut cancelled = Vec::new();
            for (i, h) in handles.iter().enumerate() {
                if cancel_mask[i] && queue.cancel(*h) {
                    cancelled.push(i);
                }
            }
            fired.extend(drain(&mut queue));

            // output seen before the cancels is untouched
            prop_assert_eq!(&fired[..observed.len()], &observed[..]);
            for i in &cancelled {
                prop_assert!(!fired.contains(i));
                prop_assert!(!observed.contains(i));
            }
            prop_assert_eq!(fired.len() + cancelled.len(), times.len());
        }
    }
}
