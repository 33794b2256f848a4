//! Error types for cosim
//!
//! Every variant here ends the run when it reaches the scheduler loop. The
//! recoverable cases (cancelling a stale handle, an empty receive) are not
//! errors at all.

use thiserror::Error;

use crate::{SimTime, TimeUnit};

/// Core cosim errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CosimError {
    // Time errors
    #[error("Invalid duration string: {0:?}")]
    InvalidDuration(String),

    #[error("Resolution is locked at {current}; cannot change to {requested}")]
    ResolutionLocked {
        current: TimeUnit,
        requested: TimeUnit,
    },

    #[error("Time regression: clock at {now}, asked to move to {target}")]
    TimeRegression { now: SimTime, target: SimTime },

    #[error("Unknown live time slot {0}")]
    UnknownSlot(u64),

    // Scheduling errors
    #[error("Causality violation: event at {at} scheduled while clock is at {now}")]
    CausalityViolation { at: SimTime, now: SimTime },

    #[error("Horizon violation: event at {at} beyond granted horizon {horizon}")]
    HorizonViolation { at: SimTime, horizon: SimTime },

    #[error("Invalid scheduler state: {0}")]
    InvalidState(String),

    // Federate errors
    #[error("Federate granted {granted} but {requested} was requested")]
    GrantBelowRequest { requested: SimTime, granted: SimTime },

    #[error("Requested time {requested} is beyond federate end time {end}")]
    BeyondFederateEnd { requested: SimTime, end: SimTime },

    #[error("Lost connection to federate")]
    FederateDisconnected,

    // Wire errors
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    // Application errors
    #[error("Bridge application is missing name")]
    MissingName,

    #[error("Name already registered: {0}")]
    DuplicateName(String),

    #[error("Address family mismatch: {local} cannot reach {remote}")]
    AddressFamilyMismatch { local: String, remote: String },

    #[error("Application {0} has not been started")]
    NotStarted(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for cosim operations
pub type CosimResult<T> = Result<T, CosimError>;
