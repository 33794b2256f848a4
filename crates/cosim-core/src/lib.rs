//! cosim Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every cosim crate:
//! - Time values (SimTime) and the units they can be expressed in (TimeUnit)
//! - Identifiers (EventId, AppId)
//! - The error type and result alias

pub mod error;
pub mod id;
pub mod time;

pub use error::*;
pub use id::*;
pub use time::*;
