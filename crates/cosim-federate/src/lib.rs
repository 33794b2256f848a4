//! cosim Federate - Connection to the external co-simulation federate
//!
//! This crate provides:
//! - The `Federate` contract (publish, blocking time request, finish)
//! - `FederateBridge`, which owns the connection and the synchronization horizon
//! - `LocalFederate`, a deterministic in-process federate
//! - `ChannelFederate`, a rendezvous with a federate driven from another thread

pub mod bridge;
pub mod channel;
pub mod federate;
pub mod local;

pub use bridge::*;
pub use channel::*;
pub use federate::*;
pub use local::*;
