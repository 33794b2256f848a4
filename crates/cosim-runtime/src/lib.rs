//! cosim Runtime - Event queue and the synchronized simulation loop
//!
//! This crate implements:
//! - A priority event queue with lazy cancellation and FIFO tie-break
//! - The horizon-gated scheduler: drain, request, merge deliveries, resume
//! - Simulation configuration
//! - Tracing subscriber setup

pub mod config;
pub mod logging;
pub mod queue;
pub mod scheduler;

pub use config::*;
pub use logging::*;
pub use queue::*;
pub use scheduler::*;
