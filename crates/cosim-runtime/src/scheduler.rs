//! Horizon-gated scheduler
//!
//! Drains the event queue in `(timestamp, id)` order, but never past the
//! synchronization horizon: when the next event lies beyond it, the
//! scheduler asks the federate bridge for a grant and blocks until it
//! arrives. Messages delivered with the grant are merged into the queue at
//! their own timestamps before draining resumes.

use std::fmt;

use cosim_core::{CosimError, CosimResult, SimTime, TimeUnit};
use cosim_federate::{Delivery, Federate, FederateBridge};
use cosim_time::{Rescalable, VirtualClock};

use crate::{EventHandle, EventQueue};

/// Context of events that belong to no node
pub const NO_CONTEXT: u32 = u32::MAX;

/// A callback fired at its scheduled time
pub type EventFn<W, F> = Box<dyn FnOnce(&mut W, &mut SyncScheduler<W, F>) -> CosimResult<()>>;

/// What an event does when it fires
pub enum EventPayload<W, F> {
    Call(EventFn<W, F>),
    Deliver(Delivery),
    Stop,
}

impl<W, F> fmt::Debug for EventPayload<W, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventPayload::Call(_) => f.write_str("Call"),
            EventPayload::Deliver(d) => write!(f, "Deliver({})", d.message),
            EventPayload::Stop => f.write_str("Stop"),
        }
    }
}

/// The simulated world the scheduler drives
pub trait SimWorld: Sized {
    /// A federate message reached its timestamp
    fn on_delivery<F: Federate>(
        &mut self,
        scheduler: &mut SyncScheduler<Self, F>,
        delivery: Delivery,
    ) -> CosimResult<()>;

    /// The run has ended, successfully or not
    fn on_stop(&mut self) -> CosimResult<()> {
        Ok(())
    }
}

/// A world with no state; federate messages are dropped
impl SimWorld for () {
    fn on_delivery<F: Federate>(
        &mut self,
        scheduler: &mut SyncScheduler<Self, F>,
        delivery: Delivery,
    ) -> CosimResult<()> {
        tracing::debug!(
            now = %scheduler.clock().display(scheduler.now()),
            message = %delivery.message,
            "Federate message ignored"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    AwaitingGrant,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::AwaitingGrant => "awaiting grant",
            SchedulerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Scheduler counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub events_scheduled: u64,
    pub events_fired: u64,
    pub events_cancelled: u64,
    pub grant_requests: u64,
    pub deliveries_merged: u64,
}

/// Outcome of a completed run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub end_time: SimTime,
    pub horizon: SimTime,
    pub stats: SchedulerStats,
}

/// Single-threaded discrete-event scheduler gated by federate grants
/// INVARIANT: every fired event has `timestamp <= horizon`
pub struct SyncScheduler<W, F> {
    clock: VirtualClock,
    queue: EventQueue<EventPayload<W, F>>,
    bridge: FederateBridge<F>,
    state: SchedulerState,
    stop_time: Option<SimTime>,
    stop_event: Option<EventHandle>,
    stop_requested: bool,
    context: u32,
    stats: SchedulerStats,
}

impl<W: SimWorld, F: Federate> SyncScheduler<W, F> {
    pub fn new(federate: F) -> Self {
        Self::with_clock(VirtualClock::new(), federate)
    }

    pub fn with_clock(clock: VirtualClock, federate: F) -> Self {
        SyncScheduler {
            clock,
            queue: EventQueue::new(),
            bridge: FederateBridge::new(federate),
            state: SchedulerState::Idle,
            stop_time: None,
            stop_event: None,
            stop_requested: false,
            context: NO_CONTEXT,
            stats: SchedulerStats::default(),
        }
    }

    // Scheduling

    /// Schedule `f` after `delay`, in the context of the current event
    pub fn schedule<C>(&mut self, delay: SimTime, f: C) -> CosimResult<EventHandle>
    where
        C: FnOnce(&mut W, &mut SyncScheduler<W, F>) -> CosimResult<()> + 'static,
    {
        let context = self.context;
        self.schedule_with_context(delay, context, f)
    }

    /// Schedule `f` after `delay` on behalf of node `context`
    pub fn schedule_with_context<C>(
        &mut self,
        delay: SimTime,
        context: u32,
        f: C,
    ) -> CosimResult<EventHandle>
    where
        C: FnOnce(&mut W, &mut SyncScheduler<W, F>) -> CosimResult<()> + 'static,
    {
        let now = self.now();
        let at = now.checked_add(delay).ok_or(CosimError::CausalityViolation {
            at: SimTime::MAX,
            now,
        })?;
        self.insert(at, context, EventPayload::Call(Box::new(f)))
    }

    /// Schedule `f` at absolute time `at`
    pub fn schedule_at<C>(&mut self, at: SimTime, f: C) -> CosimResult<EventHandle>
    where
        C: FnOnce(&mut W, &mut SyncScheduler<W, F>) -> CosimResult<()> + 'static,
    {
        let context = self.context;
        self.insert(at, context, EventPayload::Call(Box::new(f)))
    }

    /// Schedule `f` at the current time, after everything already queued for it
    pub fn schedule_now<C>(&mut self, f: C) -> CosimResult<EventHandle>
    where
        C: FnOnce(&mut W, &mut SyncScheduler<W, F>) -> CosimResult<()> + 'static,
    {
        self.schedule(SimTime::ZERO, f)
    }

    fn insert(
        &mut self,
        at: SimTime,
        context: u32,
        payload: EventPayload<W, F>,
    ) -> CosimResult<EventHandle> {
        let now = self.now();
        if at < now {
            return Err(CosimError::CausalityViolation { at, now });
        }
        if self.state == SchedulerState::Stopped {
            return Err(CosimError::InvalidState(format!(
                "cannot schedule at {at}: scheduler is {}",
                self.state
            )));
        }
        self.stats.events_scheduled += 1;
        Ok(self.queue.insert(at, context, payload))
    }

    /// Cancel a pending event; stale handles are ignored
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        let cancelled = self.queue.cancel(handle);
        if cancelled {
            self.stats.events_cancelled += 1;
        }
        cancelled
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.queue.is_pending(handle)
    }

    // Stopping

    /// Stop the run once `at` is reached, replacing any earlier stop time
    pub fn stop_at(&mut self, at: SimTime) -> CosimResult<()> {
        if let Some(previous) = self.stop_event.take() {
            self.queue.cancel(previous);
        }
        self.stop_event = Some(self.insert(at, NO_CONTEXT, EventPayload::Stop)?);
        self.stop_time = Some(at);
        Ok(())
    }

    /// Stop after the current event returns
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_time(&self) -> Option<SimTime> {
        self.stop_time
    }

    // Federation

    /// Publish a topic update to the federate
    pub fn publish(&mut self, topic: &str, value: &str) -> CosimResult<()> {
        self.bridge.publish(topic, value)
    }

    /// Change the time resolution; only allowed before the run
    pub fn set_resolution(&mut self, unit: TimeUnit) -> CosimResult<()> {
        if self.state != SchedulerState::Idle {
            return Err(CosimError::InvalidState(format!(
                "cannot change resolution while {}",
                self.state
            )));
        }
        let rescale = self.clock.set_resolution(unit)?;
        self.queue.rescale(&rescale);
        self.bridge.rescale(&rescale);
        self.stop_time.rescale(&rescale);
        Ok(())
    }

    // Running

    /// Run until the queue is exhausted, the stop time is reached, or an
    /// event fails
    pub fn run(&mut self, world: &mut W) -> CosimResult<RunSummary> {
        if self.state != SchedulerState::Idle {
            return Err(CosimError::InvalidState(format!(
                "cannot run a scheduler that is {}",
                self.state
            )));
        }

        self.clock.seal();
        self.state = SchedulerState::Running;
        tracing::info!(
            resolution = %self.clock.resolution(),
            events = self.queue.len(),
            stop_time = ?self.stop_time.map(|t| self.clock.display(t).to_string()),
            "Simulation started"
        );

        let result = self.drain(world);
        self.state = SchedulerState::Stopped;
        let finished = self.bridge.finish();
        let released = world.on_stop();

        if let Err(e) = &result {
            tracing::error!(
                now = %self.clock.display(self.now()),
                error = %e,
                "Simulation aborted"
            );
        }
        result?;
        finished?;
        released?;

        let summary = RunSummary {
            end_time: self.now(),
            horizon: self.bridge.horizon(),
            stats: self.stats.clone(),
        };
        tracing::info!(
            end_time = %self.clock.display(summary.end_time),
            fired = summary.stats.events_fired,
            grants = summary.stats.grant_requests,
            "Simulation finished"
        );
        Ok(summary)
    }

    fn drain(&mut self, world: &mut W) -> CosimResult<()> {
        while !self.stop_requested {
            let Some(next) = self.queue.next_time() else {
                tracing::debug!("Event queue exhausted");
                break;
            };

            if next > self.bridge.horizon() {
                self.await_grant(next)?;
                continue;
            }

            let Some(event) = self.queue.pop_min() else {
                break;
            };
            let at = event.timestamp();
            let horizon = self.bridge.horizon();
            if at > horizon {
                return Err(CosimError::HorizonViolation { at, horizon });
            }

            self.clock.advance_to(at)?;
            self.context = event.context;
            self.stats.events_fired += 1;
            tracing::trace!(
                id = %event.handle.id,
                context = event.context,
                payload = ?event.payload,
                "Firing event"
            );

            match event.payload {
                EventPayload::Call(f) => f(world, self)?,
                EventPayload::Deliver(delivery) => world.on_delivery(self, delivery)?,
                EventPayload::Stop => {
                    tracing::debug!(now = %self.clock.display(at), "Stop time reached");
                    break;
                }
            }
            self.context = NO_CONTEXT;
        }
        Ok(())
    }

    fn await_grant(&mut self, next: SimTime) -> CosimResult<()> {
        self.state = SchedulerState::AwaitingGrant;
        self.stats.grant_requests += 1;
        self.bridge.request_time_advance(&self.clock, next)?;
        self.state = SchedulerState::Running;

        let now = self.now();
        for delivery in self.bridge.drain_incoming() {
            if delivery.timestamp < now {
                return Err(CosimError::CausalityViolation {
                    at: delivery.timestamp,
                    now,
                });
            }
            self.stats.deliveries_merged += 1;
            self.queue
                .insert(delivery.timestamp, NO_CONTEXT, EventPayload::Deliver(delivery));
        }
        Ok(())
    }

    // Accessors

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Node the currently firing event belongs to
    pub fn context(&self) -> u32 {
        self.context
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Mutable clock access, for tracking live values before the run
    pub fn clock_mut(&mut self) -> &mut VirtualClock {
        &mut self.clock
    }

    pub fn bridge(&self) -> &FederateBridge<F> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut FederateBridge<F> {
        &mut self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_federate::{InboundMessage, LocalFederate};
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Sched<W> = SyncScheduler<W, LocalFederate>;

    /// Records what fired and the horizon each event saw
    #[derive(Default)]
    struct Log {
        fired: Vec<(&'static str, SimTime, SimTime)>,
        delivered: Vec<(String, SimTime)>,
    }

    impl SimWorld for Log {
        fn on_delivery<F: Federate>(
            &mut self,
            scheduler: &mut SyncScheduler<Self, F>,
            delivery: Delivery,
        ) -> CosimResult<()> {
            assert_eq!(scheduler.now(), delivery.timestamp);
            self.delivered
                .push((delivery.message.to_string(), delivery.timestamp));
            Ok(())
        }
    }

    fn record(name: &'static str) -> impl FnOnce(&mut Log, &mut Sched<Log>) -> CosimResult<()> {
        move |log, sched| {
            log.fired.push((name, sched.now(), sched.bridge().horizon()));
            Ok(())
        }
    }

    fn secs<W: SimWorld>(sched: &Sched<W>, s: i64) -> SimTime {
        sched.clock().from_integer(s, TimeUnit::Second)
    }

    #[test]
    fn test_run_gates_on_horizon() {
        let federate = LocalFederate::new(TimeUnit::Second).with_step(10);
        let mut sched: Sched<Log> = SyncScheduler::new(federate);
        let (t5, t12) = (secs(&sched, 5), secs(&sched, 12));

        sched.schedule_at(t12, record("late")).unwrap();
        sched.schedule_at(t5, record("early")).unwrap();

        let mut log = Log::default();
        let summary = sched.run(&mut log).unwrap();

        // the first grant rounds 5s up to 10s, which does not cover 12s
        assert_eq!(sched.bridge().federate().requests(), &[5, 12]);
        assert_eq!(log.fired[0], ("early", t5, secs(&sched, 10)));
        assert_eq!(log.fired[1].0, "late");
        assert!(log.fired[1].2 >= t12);
        assert_eq!(summary.end_time, t12);
        assert_eq!(summary.stats.grant_requests, 2);
        assert_eq!(sched.state(), SchedulerState::Stopped);
        assert!(sched.bridge().federate().is_finished());
    }

    #[test]
    fn test_events_inside_horizon_need_no_request() {
        let federate = LocalFederate::new(TimeUnit::Second).with_step(100);
        let mut sched: Sched<Log> = SyncScheduler::new(federate);
        for s in [1, 2, 3] {
            let t = secs(&sched, s);
            sched.schedule_at(t, record("tick")).unwrap();
        }

        sched.run(&mut Log::default()).unwrap();
        assert_eq!(sched.bridge().federate().requests(), &[1]);
    }

    #[test]
    fn test_stop_time_ends_run() {
        let federate = LocalFederate::new(TimeUnit::Second);
        let mut sched: Sched<Log> = SyncScheduler::new(federate);
        let (t5, t10, t20) = (secs(&sched, 5), secs(&sched, 10), secs(&sched, 20));

        sched.schedule_at(t5, record("a")).unwrap();
        sched.schedule_at(t20, record("b")).unwrap();
        sched.stop_at(t10).unwrap();

        let mut log = Log::default();
        let summary = sched.run(&mut log).unwrap();

        assert_eq!(log.fired.len(), 1);
        assert_eq!(summary.end_time, t10);
        assert_eq!(sched.pending_events(), 1);
        assert!(sched.run(&mut log).is_err());
    }

    #[test]
    fn test_explicit_stop_from_event() {
        let mut sched: Sched<Log> = SyncScheduler::new(LocalFederate::new(TimeUnit::Second));
        let t1 = secs(&sched, 1);
        sched
            .schedule_at(t1, |log: &mut Log, sched: &mut Sched<Log>| {
                log.fired.push(("stopper", sched.now(), sched.bridge().horizon()));
                sched.stop();
                Ok(())
            })
            .unwrap();
        sched.schedule_at(t1, record("never")).unwrap();

        let mut log = Log::default();
        sched.run(&mut log).unwrap();
        assert_eq!(log.fired.len(), 1);
    }

    #[test]
    fn test_events_can_schedule_and_cancel() {
        let mut sched: Sched<Log> = SyncScheduler::new(LocalFederate::new(TimeUnit::Millisecond));
        let t1 = secs(&sched, 1);
        let victim = sched.schedule_at(secs(&sched, 3), record("victim")).unwrap();

        sched
            .schedule_at(t1, move |log: &mut Log, sched: &mut Sched<Log>| {
                log.fired.push(("first", sched.now(), sched.bridge().horizon()));
                sched.cancel(victim);
                let delay = sched.clock().from_integer(1, TimeUnit::Second);
                sched.schedule(delay, record("child"))?;
                Ok(())
            })
            .unwrap();

        let mut log = Log::default();
        let summary = sched.run(&mut log).unwrap();

        let names: Vec<_> = log.fired.iter().map(|f| f.0).collect();
        assert_eq!(names, ["first", "child"]);
        assert_eq!(log.fired[1].1, secs(&sched, 2));
        assert_eq!(summary.stats.events_cancelled, 1);
    }

    #[test]
    fn test_scheduling_in_the_past_is_rejected() {
        let mut sched: Sched<Log> = SyncScheduler::new(LocalFederate::new(TimeUnit::Second));
        let t2 = secs(&sched, 2);
        let seen = Rc::new(RefCell::new(None));
        let out = Rc::clone(&seen);

        sched
            .schedule_at(t2, move |_: &mut Log, sched: &mut Sched<Log>| {
                let err = sched.schedule_at(SimTime(1), record("past")).unwrap_err();
                *out.borrow_mut() = Some(err);
                Ok(())
            })
            .unwrap();
        sched.run(&mut Log::default()).unwrap();

        assert_eq!(
            *seen.borrow(),
            Some(CosimError::CausalityViolation { at: SimTime(1), now: t2 })
        );
    }

    #[test]
    fn test_event_error_aborts_run() {
        let mut sched: Sched<Log> = SyncScheduler::new(LocalFederate::new(TimeUnit::Second));
        let (t1, t2) = (secs(&sched, 1), secs(&sched, 2));
        sched
            .schedule_at(t1, |_: &mut Log, _: &mut Sched<Log>| {
                Err(CosimError::MalformedMessage("bad".into()))
            })
            .unwrap();
        sched.schedule_at(t2, record("after")).unwrap();

        let mut log = Log::default();
        let err = sched.run(&mut log).unwrap_err();
        assert_eq!(err, CosimError::MalformedMessage("bad".into()));
        assert!(log.fired.is_empty());
        assert_eq!(sched.state(), SchedulerState::Stopped);
        assert!(sched.bridge().federate().is_finished());
    }

    #[test]
    fn test_federate_end_time_is_fatal() {
        let federate = LocalFederate::new(TimeUnit::Second).with_end_time(10);
        let mut sched: Sched<Log> = SyncScheduler::new(federate);
        let t30 = secs(&sched, 30);
        sched.schedule_at(t30, record("too late")).unwrap();

        let err = sched.run(&mut Log::default()).unwrap_err();
        assert!(matches!(err, CosimError::BeyondFederateEnd { .. }));
    }

    #[test]
    fn test_deliveries_merge_at_their_timestamps() {
        let mut federate = LocalFederate::new(TimeUnit::Second).with_step(10);
        federate.push_message(InboundMessage::new(4, "load", "1.5"));
        federate.push_message(InboundMessage::new(4, "load", "1.6"));
        let mut sched: Sched<Log> = SyncScheduler::new(federate);
        let (t2, t6) = (secs(&sched, 2), secs(&sched, 6));
        sched.schedule_at(t2, record("a")).unwrap();
        sched.schedule_at(t6, record("b")).unwrap();

        let mut log = Log::default();
        let summary = sched.run(&mut log).unwrap();

        assert_eq!(
            log.delivered,
            vec![
                ("load=1.5".to_string(), secs(&sched, 4)),
                ("load=1.6".to_string(), secs(&sched, 4)),
            ]
        );
        assert_eq!(log.fired.len(), 2);
        assert_eq!(summary.stats.deliveries_merged, 2);
    }

    #[test]
    fn test_set_resolution_rescales_queue_and_stop_time() {
        let mut sched: Sched<Log> = SyncScheduler::new(LocalFederate::new(TimeUnit::Millisecond));
        let t = sched.clock().parse("1500us").unwrap();
        sched.schedule_at(t, record("x")).unwrap();
        sched.stop_at(sched.clock().parse("3ms").unwrap()).unwrap();

        sched.set_resolution(TimeUnit::Microsecond).unwrap();
        assert_eq!(sched.stop_time(), Some(SimTime(3_000)));
        assert!(sched.set_resolution(TimeUnit::Second).is_err());

        let mut log = Log::default();
        sched.run(&mut log).unwrap();
        assert_eq!(log.fired[0].1, SimTime(1_500));
        assert_eq!(sched.now(), SimTime(3_000));
    }

    #[test]
    fn test_set_resolution_after_run_is_rejected() {
        let mut sched: Sched<()> = SyncScheduler::new(LocalFederate::new(TimeUnit::Second));
        sched.run(&mut ()).unwrap();
        assert!(matches!(
            sched.set_resolution(TimeUnit::Millisecond),
            Err(CosimError::InvalidState(_))
        ));
    }

    proptest! {
        #[test]
        fn never_fires_beyond_granted_horizon(
            times in prop::collection::vec(0i64..200, 1..40),
            step in 1u64..50,
        ) {
            let federate = LocalFederate::new(TimeUnit::Second).with_step(step);
            let mut sched: Sched<Log> = SyncScheduler::new(federate);
            for t in &times {
                let at = secs(&sched, *t);
                sched.schedule_at(at, record("e")).unwrap();
            }

            let mut log = Log::default();
            sched.run(&mut log).unwrap();

            prop_assert_eq!(log.fired.len(), times.len());
            let mut last = SimTime::ZERO;
            for (_, at, horizon) in &log.fired {
                prop_assert!(at <= horizon);
                prop_assert!(*at >= last);
                last = *at;
            }
        }
    }
}
