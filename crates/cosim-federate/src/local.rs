//! In-process federate
//!
//! Grants every request immediately, optionally rounded up to a step
//! boundary and capped at an end time. Scripted messages are released by
//! the first grant that reaches their time. Everything the simulator sends
//! is recorded for inspection.

use cosim_core::{CosimError, CosimResult, TimeUnit};
use cosim_wire::TopicMessage;

use crate::{Federate, Grant, InboundMessage};

#[derive(Debug)]
pub struct LocalFederate {
    unit: TimeUnit,
    step: Option<u64>,
    end_time: Option<u64>,
    granted: u64,
    scripted: Vec<InboundMessage>,
    published: Vec<TopicMessage>,
    requests: Vec<u64>,
    finished: bool,
}

impl LocalFederate {
    pub fn new(unit: TimeUnit) -> Self {
        LocalFederate {
            unit,
            step: None,
            end_time: None,
            granted: 0,
            scripted: Vec::new(),
            published: Vec::new(),
            requests: Vec::new(),
            finished: false,
        }
    }

    /// Grant only multiples of `step`
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = (step > 0).then_some(step);
        self
    }

    pub fn with_end_time(mut self, end: u64) -> Self {
        self.end_time = Some(end);
        self
    }

    /// Queue a message to be released once a grant reaches its time
    pub fn push_message(&mut self, message: InboundMessage) {
        self.scripted.push(message);
    }

    /// Messages published by the simulator, in order
    pub fn published(&self) -> &[TopicMessage] {
        &self.published
    }

    /// Times requested by the simulator, in order
    pub fn requests(&self) -> &[u64] {
        &self.requests
    }

    /// Last granted time
    pub fn granted(&self) -> u64 {
        self.granted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn grant_for(&self, time: u64) -> u64 {
        let granted = match self.step {
            Some(step) => time.div_ceil(step).saturating_mul(step),
            None => time,
        };
        match self.end_time {
            Some(end) => granted.min(end.max(time)),
            None => granted,
        }
    }
}

impl Federate for LocalFederate {
    fn time_unit(&self) -> TimeUnit {
        self.unit
    }

    fn end_time(&self) -> Option<u64> {
        self.end_time
    }

    fn publish(&mut self, message: TopicMessage) -> CosimResult<()> {
        if self.finished {
            return Err(CosimError::FederateDisconnected);
        }
        self.published.push(message);
        Ok(())
    }

    fn request_time(&mut self, time: u64) -> CosimResult<Grant> {
        if self.finished {
            return Err(CosimError::FederateDisconnected);
        }
        self.requests.push(time);

        let previous = self.granted;
        let granted = self.grant_for(time).max(previous);
        self.granted = granted;

        let (released, kept) = std::mem::take(&mut self.scripted)
            .into_iter()
            .partition::<Vec<_>, _>(|m| m.time <= granted);
        self.scripted = kept;

        // messages scripted before the previous grant surface at that grant
        let messages = released
            .into_iter()
            .map(|mut m| {
                m.time = m.time.max(previous);
                m
            })
            .collect();

        Ok(Grant { granted, messages })
    }

    fn finish(&mut self) -> CosimResult<()> {
        self.finished = true;
        Ok(())
    }
}
