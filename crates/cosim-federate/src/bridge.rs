//! Federate bridge
//!
//! Owns the single federate connection and the synchronization horizon: the
//! furthest simulation time the scheduler may reach without asking again.

use std::collections::VecDeque;

use cosim_core::{CosimError, CosimResult, SimTime, TimeUnit};
use cosim_time::{Rescalable, Rescale, VirtualClock};
use cosim_wire::TopicMessage;

use crate::{Delivery, Federate};

/// Bridge counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub published: u64,
    pub time_requests: u64,
    pub deliveries: u64,
}

/// The simulator's side of the federation
/// INVARIANT: `horizon` never decreases
pub struct FederateBridge<F> {
    federate: F,
    horizon: SimTime,
    pending: VecDeque<Delivery>,
    stats: BridgeStats,
    finished: bool,
}

impl<F: Federate> FederateBridge<F> {
    pub fn new(federate: F) -> Self {
        FederateBridge {
            federate,
            horizon: SimTime::ZERO,
            pending: VecDeque::new(),
            stats: BridgeStats::default(),
            finished: false,
        }
    }

    /// Publish a topic update to the federation
    pub fn publish(&mut self, topic: &str, value: &str) -> CosimResult<()> {
        self.publish_message(TopicMessage::new(topic, value))
    }

    pub fn publish_message(&mut self, message: TopicMessage) -> CosimResult<()> {
        tracing::trace!(%message, "Publishing to federate");
        self.federate.publish(message)?;
        self.stats.published += 1;
        Ok(())
    }

    /// Ask the federation to let the simulation reach `target`
    ///
    /// Blocks until the grant arrives. On success the horizon covers
    /// `target` and the grant's messages wait in `drain_incoming`.
    pub fn request_time_advance(
        &mut self,
        clock: &VirtualClock,
        target: SimTime,
    ) -> CosimResult<SimTime> {
        let unit = self.federate.time_unit();
        let request = u64::try_from(clock.to_integer_ceil(target, unit).max(0))
            .map_err(|_| CosimError::InvalidState(format!("cannot request {target}")))?;

        if let Some(end) = self.federate.end_time() {
            if request > end {
                return Err(CosimError::BeyondFederateEnd {
                    requested: target,
                    end: to_sim(clock, end, unit),
                });
            }
        }

        tracing::debug!(
            requested = %clock.display(target),
            request,
            unit = %unit,
            "Requesting time advance"
        );
        self.stats.time_requests += 1;
        let grant = self.federate.request_time(request)?;

        let granted = to_sim(clock, grant.granted, unit);
        if grant.granted < request {
            return Err(CosimError::GrantBelowRequest {
                requested: target,
                granted,
            });
        }

        self.horizon = self.horizon.max(granted);
        tracing::debug!(
            granted = %clock.display(granted),
            messages = grant.messages.len(),
            "Time advance granted"
        );

        for inbound in grant.messages {
            self.pending.push_back(Delivery {
                message: inbound.message,
                timestamp: to_sim(clock, inbound.time, unit),
            });
        }

        Ok(granted)
    }

    /// Take every delivery received so far, in federate order
    pub fn drain_incoming(&mut self) -> Vec<Delivery> {
        self.stats.deliveries += self.pending.len() as u64;
        self.pending.drain(..).collect()
    }

    pub fn has_incoming(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Furthest time the simulation may reach without a new grant
    pub fn horizon(&self) -> SimTime {
        self.horizon
    }

    /// Tell the federation this simulator is done; later calls are no-ops
    pub fn finish(&mut self) -> CosimResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        tracing::debug!(stats = ?self.stats, "Leaving federation");
        self.federate.finish()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    pub fn federate(&self) -> &F {
        &self.federate
    }

    pub fn federate_mut(&mut self) -> &mut F {
        &mut self.federate
    }

    pub fn into_federate(self) -> F {
        self.federate
    }
}

impl<F> Rescalable for FederateBridge<F> {
    fn rescale(&mut self, rescale: &Rescale) {
        self.horizon.rescale(rescale);
        for delivery in &mut self.pending {
            delivery.timestamp.rescale(rescale);
        }
    }
}

fn to_sim(clock: &VirtualClock, value: u64, unit: TimeUnit) -> SimTime {
    clock.from_integer(i64::try_from(value).unwrap_or(i64::MAX), unit)
}
