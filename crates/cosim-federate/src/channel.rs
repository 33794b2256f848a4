//! Channel federate
//!
//! The simulator holds a `ChannelFederate`; whatever speaks to the real
//! federation holds the matching `FederateEndpoint`, typically on another
//! thread or inside an async task. Publications are fire-and-forget. A time
//! request carries a oneshot reply and the simulator blocks on it, so there
//! is no polling anywhere.

use tokio::sync::{mpsc, oneshot};

use cosim_core::{CosimError, CosimResult, TimeUnit};
use cosim_wire::TopicMessage;

use crate::{Federate, Grant};

/// A request from the simulator to the federation
#[derive(Debug)]
pub enum FederateRequest {
    Publish(TopicMessage),
    TimeRequest {
        time: u64,
        reply: oneshot::Sender<Grant>,
    },
    Finish,
}

/// Create a connected federate/endpoint pair
pub fn federate_channel(
    unit: TimeUnit,
    end_time: Option<u64>,
) -> (ChannelFederate, FederateEndpoint) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChannelFederate {
            unit,
            end_time,
            requests: tx,
        },
        FederateEndpoint { requests: rx },
    )
}

/// Simulator side of the channel
///
/// Time requests block the calling thread, so the scheduler that owns this
/// federate must run on a plain thread or inside `spawn_blocking`, never
/// directly on a tokio runtime worker (tokio panics there).
#[derive(Debug)]
pub struct ChannelFederate {
    unit: TimeUnit,
    end_time: Option<u64>,
    requests: mpsc::UnboundedSender<FederateRequest>,
}

impl ChannelFederate {
    fn send(&self, request: FederateRequest) -> CosimResult<()> {
        self.requests
            .send(request)
            .map_err(|_| CosimError::FederateDisconnected)
    }
}

impl Federate for ChannelFederate {
    fn time_unit(&self) -> TimeUnit {
        self.unit
    }

    fn end_time(&self) -> Option<u64> {
        self.end_time
    }

    fn publish(&mut self, message: TopicMessage) -> CosimResult<()> {
        self.send(FederateRequest::Publish(message))
    }

    fn request_time(&mut self, time: u64) -> CosimResult<Grant> {
        let (reply, response) = oneshot::channel();
        self.send(FederateRequest::TimeRequest { time, reply })?;
        response
            .blocking_recv()
            .map_err(|_| CosimError::FederateDisconnected)
    }

    fn finish(&mut self) -> CosimResult<()> {
        self.send(FederateRequest::Finish)
    }
}

/// Federation side of the channel
#[derive(Debug)]
pub struct FederateEndpoint {
    requests: mpsc::UnboundedReceiver<FederateRequest>,
}

impl FederateEndpoint {
    /// Next request; `None` once the simulator side is dropped
    pub async fn recv(&mut self) -> Option<FederateRequest> {
        self.requests.recv().await
    }

    /// Blocking variant for use outside an async runtime
    pub fn blocking_recv(&mut self) -> Option<FederateRequest> {
        self.requests.blocking_recv()
    }
}
