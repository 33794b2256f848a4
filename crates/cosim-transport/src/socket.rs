//! Socket interface

use std::net::SocketAddr;

use cosim_core::CosimResult;
use cosim_wire::Packet;

/// A datagram socket
pub trait Socket {
    /// Bind to a specific address; port 0 picks an ephemeral port
    fn bind(&mut self, addr: SocketAddr) -> CosimResult<SocketAddr>;

    /// Bind to the IPv4 any-address on an ephemeral port
    fn bind_any(&mut self) -> CosimResult<SocketAddr>;

    /// Bound address, if any
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Send one packet; an unbound socket is bound to the any-address first
    fn send_to(&mut self, packet: Packet, dest: SocketAddr) -> CosimResult<()>;

    /// Next received packet and its source, `None` when nothing is waiting
    fn recv_from(&mut self) -> Option<(Packet, SocketAddr)>;

    /// Release the binding and drop anything still queued
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Creates sockets attached to some medium
pub trait SocketFactory {
    type Socket: Socket;

    fn create_socket(&self) -> CosimResult<Self::Socket>;
}
