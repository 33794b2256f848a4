//! cosim Time - Virtual clock and resolution control
//!
//! This crate implements the virtual clock:
//! - 64.64 fixed-point arithmetic for fractional unit conversions
//! - Per-resolution conversion tables
//! - A registry of live time values that follows the one-time rescale
//! - Duration string parsing ("1.5ms", "10s")

pub mod clock;
pub mod fixed;
pub mod parse;
pub mod registry;
pub mod resolution;

pub use clock::*;
pub use fixed::*;
pub use parse::*;
pub use registry::*;
pub use resolution::*;
