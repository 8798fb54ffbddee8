//! Error definitions shared across library modules.
//! Lifecycle and configuration failures are returned synchronously to the
//! caller; callback failures are contained at the dispatch boundary.
use thiserror::Error;

/// Error type returned by user actions. Anything the action reports is
/// logged and counted by the dispatcher, never propagated to the platform.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Errors raised by timer lifecycle and configuration operations.
pub enum TimerError {
    /// The timer was disposed; it is permanently inert.
    #[error("Tried to {operation} a precision timer that was already disposed")]
    Disposed { operation: &'static str },

    /// Period or resolution outside the platform capability bounds.
    #[error("Timer {parameter} out of range: {value} ms (allowed: {min}..={max} ms)")]
    OutOfRange {
        parameter: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Configuration was attempted while the timer runs; stop it first.
    #[error("Timer must be stopped before it can be configured")]
    TimerRunning,

    /// The platform refused to create the native timer.
    #[error("Unable to start the precision timer: reconfigure it, the platform may be at its limit")]
    StartFailed,

    /// A user action failed during dispatch. Contained, never fatal.
    #[error("Timer action failed: {reason}")]
    CallbackFailed { reason: String },

    /// The platform could not report its capabilities; no timer can be built.
    #[error(transparent)]
    CapabilityQuery(#[from] PlatformError),

    /// A minimum resolution request was refused.
    #[error("Timer resolution {resolution} ms is out of range and not supported")]
    ResolutionNotSupported { resolution: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Failures reported by a [`TimerPlatform`](crate::platform::TimerPlatform).
pub enum PlatformError {
    /// The capability query itself failed.
    #[error("Platform capability query failed: {0}")]
    CapabilityQuery(String),
    /// The platform reported bounds that violate `1 <= min <= max`.
    #[error("Platform reported invalid timer capabilities: min {min} ms, max {max} ms")]
    InvalidCapabilities { min: u32, max: u32 },
    /// Cancel was called with an id the platform does not know.
    #[error("Unknown native timer handle {0}")]
    UnknownHandle(u32),
    /// The platform failed to cancel a live timer.
    #[error("Native timer cancel failed with status {status}")]
    Cancel { status: u32 },
}
