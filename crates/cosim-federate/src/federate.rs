//! The federate contract
//!
//! A federate counts time as whole units of its own `TimeUnit`, independent
//! of the simulator's resolution. `request_time` blocks until the federation
//! agrees the simulator may advance.

use cosim_core::{CosimResult, SimTime, TimeUnit};
use cosim_wire::TopicMessage;

/// A message published by another federate, stamped in federate time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub message: TopicMessage,
    pub time: u64,
}

impl InboundMessage {
    pub fn new(time: u64, topic: impl Into<String>, value: impl Into<String>) -> Self {
        InboundMessage {
            message: TopicMessage::new(topic, value),
            time,
        }
    }
}

/// Federate reply to a time request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grant {
    /// Granted time in federate units
    pub granted: u64,
    /// Messages that became visible up to `granted`, in federate order
    pub messages: Vec<InboundMessage>,
}

impl Grant {
    pub fn new(granted: u64) -> Self {
        Grant {
            granted,
            messages: Vec::new(),
        }
    }
}

/// A federate message converted to simulation time, ready to be scheduled
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub message: TopicMessage,
    pub timestamp: SimTime,
}

/// Connection to the co-simulation federation
pub trait Federate {
    /// Unit the federate counts time in
    fn time_unit(&self) -> TimeUnit;

    /// Last time the federation will grant, if bounded
    fn end_time(&self) -> Option<u64>;

    /// Fire-and-forget publication
    fn publish(&mut self, message: TopicMessage) -> CosimResult<()>;

    /// Block until the federation grants a time
    fn request_time(&mut self, time: u64) -> CosimResult<Grant>;

    /// Leave the federation
    fn finish(&mut self) -> CosimResult<()>;
}

impl<F: Federate + ?Sized> Federate for Box<F> {
    fn time_unit(&self) -> TimeUnit {
        (**self).time_unit()
    }

    fn end_time(&self) -> Option<u64> {
        (**self).end_time()
    }

    fn publish(&mut self, message: TopicMessage) -> CosimResult<()> {
        (**self).publish(message)
    }

    fn request_time(&mut self, time: u64) -> CosimResult<Grant> {
        (**self).request_time(time)
    }

    fn finish(&mut self) -> CosimResult<()> {
        (**self).finish()
    }
}
