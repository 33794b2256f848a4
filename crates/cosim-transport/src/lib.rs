//! cosim Transport - Datagram sockets over a simulated medium
//!
//! This crate provides:
//! - The `Socket` / `SocketFactory` interface applications are written against
//! - `SimMedium`, an in-memory medium with exact and wildcard address binding

pub mod medium;
pub mod socket;

pub use medium::*;
pub use socket::*;
