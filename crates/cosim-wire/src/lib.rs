//! cosim Wire Protocol - Payload format crossing the simulation/federate boundary
//!
//! This crate implements:
//! - `topic=value` payload encoding and decoding
//! - Simulated packets carrying those payloads

pub mod message;
pub mod packet;

pub use message::*;
pub use packet::*;
