//! In-memory packet medium
//!
//! Sending only records a `Transmission`. Whoever owns the simulation
//! decides when it arrives and then calls `deliver`, which queues the
//! packet on the socket bound to the destination. Lookup tries the exact
//! address first, then the wildcard address of the same family and port.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use parking_lot::Mutex;

use cosim_core::{CosimError, CosimResult};
use cosim_wire::Packet;

use crate::{Socket, SocketFactory};

/// First port handed out to `bind_any` and port-0 binds
pub const EPHEMERAL_PORT_START: u16 = 49153;

/// A packet in flight
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transmission {
    pub from: SocketAddr,
    pub to: SocketAddr,
    pub packet: Packet,
}

/// Medium counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediumStats {
    pub sent: u64,
    pub delivered: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct MediumState {
    bindings: HashMap<SocketAddr, u64>,
    inboxes: HashMap<u64, VecDeque<(Packet, SocketAddr)>>,
    in_flight: Vec<Transmission>,
    next_socket: u64,
    next_port: u16,
    stats: MediumStats,
}

impl MediumState {
    fn allocate_port(&mut self) -> CosimResult<u16> {
        if self.next_port < EPHEMERAL_PORT_START {
            self.next_port = EPHEMERAL_PORT_START;
        }
        let port = self.next_port;
        self.next_port = port
            .checked_add(1)
            .ok_or_else(|| CosimError::Transport("ephemeral ports exhausted".into()))?;
        Ok(port)
    }

    fn lookup(&self, to: SocketAddr) -> Option<(SocketAddr, u64)> {
        if let Some(id) = self.bindings.get(&to) {
            return Some((to, *id));
        }
        let wildcard = SocketAddr::new(unspecified_like(to.ip()), to.port());
        self.bindings.get(&wildcard).map(|id| (wildcard, *id))
    }
}

fn unspecified_like(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

/// Shared in-memory medium; clones refer to the same medium
#[derive(Clone, Debug, Default)]
pub struct SimMedium {
    state: Arc<Mutex<MediumState>>,
}

impl SimMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every packet sent since the last call, in send order
    pub fn take_transmissions(&self) -> Vec<Transmission> {
        std::mem::take(&mut self.state.lock().in_flight)
    }

    /// Hand a packet to whatever is bound at its destination
    ///
    /// Returns the binding that accepted it. Packets for unbound addresses
    /// are dropped.
    pub fn deliver(&self, transmission: Transmission) -> Option<SocketAddr> {
        let mut state = self.state.lock();
        let Some((bound, id)) = state.lookup(transmission.to) else {
            state.stats.dropped += 1;
            tracing::warn!(
                from = %transmission.from,
                to = %transmission.to,
                bytes = transmission.packet.size(),
                "Dropping packet: nothing bound at destination"
            );
            return None;
        };

        if let Some(inbox) = state.inboxes.get_mut(&id) {
            inbox.push_back((transmission.packet, transmission.from));
        }
        state.stats.delivered += 1;
        Some(bound)
    }

    pub fn is_bound(&self, addr: SocketAddr) -> bool {
        self.state.lock().bindings.contains_key(&addr)
    }

    pub fn stats(&self) -> MediumStats {
        self.state.lock().stats.clone()
    }
}

impl SocketFactory for SimMedium {
    type Socket = SimSocket;

    fn create_socket(&self) -> CosimResult<SimSocket> {
        let mut state = self.state.lock();
        let id = state.next_socket;
        state.next_socket += 1;
        state.inboxes.insert(id, VecDeque::new());

        Ok(SimSocket {
            id,
            medium: self.clone(),
            local: None,
            closed: false,
        })
    }
}

/// A socket attached to a `SimMedium`
#[derive(Debug)]
pub struct SimSocket {
    id: u64,
    medium: SimMedium,
    local: Option<SocketAddr>,
    closed: bool,
}

impl SimSocket {
    fn ensure_open(&self) -> CosimResult<()> {
        if self.closed {
            return Err(CosimError::Transport(format!("socket {} is closed", self.id)));
        }
        Ok(())
    }
}

impl Socket for SimSocket {
    fn bind(&mut self, addr: SocketAddr) -> CosimResult<SocketAddr> {
        self.ensure_open()?;
        if let Some(local) = self.local {
            return Err(CosimError::Transport(format!("socket already bound to {local}")));
        }

        let mut state = self.medium.state.lock();
        let mut addr = addr;
        if addr.port() == 0 {
            addr.set_port(state.allocate_port()?);
        }
        if state.bindings.contains_key(&addr) {
            return Err(CosimError::Transport(format!("address {addr} already in use")));
        }
        state.bindings.insert(addr, self.id);
        drop(state);

        self.local = Some(addr);
        Ok(addr)
    }

    fn bind_any(&mut self) -> CosimResult<SocketAddr> {
        self.bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    fn send_to(&mut self, packet: Packet, dest: SocketAddr) -> CosimResult<()> {
        self.ensure_open()?;
        let from = match self.local {
            Some(local) => local,
            None => self.bind_any()?,
        };

        let mut state = self.medium.state.lock();
        state.stats.sent += 1;
        state.in_flight.push(Transmission {
            from,
            to: dest,
            packet,
        });
        Ok(())
    }

    fn recv_from(&mut self) -> Option<(Packet, SocketAddr)> {
        if self.closed {
            return None;
        }
        self.medium
            .state
            .lock()
            .inboxes
            .get_mut(&self.id)
            .and_then(VecDeque::pop_front)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        let mut state = self.medium.state.lock();
        if let Some(local) = self.local.take() {
            state.bindings.remove(&local);
        }
        state.inboxes.remove(&self.id);
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for SimSocket {
    fn drop(&mut self) {
        self.close();
    }
}
