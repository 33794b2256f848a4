//! cosim App - Bridge between simulated packets and the federate
//!
//! This crate provides:
//! - `PacketBridgeApplication`: sends `topic=value` packets and forwards
//!   received ones to the federate
//! - `NameRegistry`: unique application names
//! - `BridgeNetwork`: the simulated world tying applications, medium and
//!   scheduler together
//! - Network configuration

pub mod app;
pub mod config;
pub mod names;
pub mod network;

pub use app::*;
pub use config::*;
pub use names::*;
pub use network::*;
