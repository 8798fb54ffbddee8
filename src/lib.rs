//! `precision-tick` library: high-resolution periodic and one-shot timers
//! layered over a platform timer primitive. The crate exposes the shared
//! data types, the platform abstraction (with a portable thread backend),
//! the timer state machine and its facades, and the notification layer.
//==================================================================================
/// Modes, lifecycle states, capability bounds, settings and events.
pub mod core;
/// Lifecycle, configuration and platform errors.
pub mod error;
/// Subscription list for timer notifications and an async channel bridge.
pub mod notify;
/// Native timer abstraction, capability probing and the thread backend.
pub mod platform;
/// Timer state machine, dispatcher, full timer and tick-only timer.
pub mod timer;

pub use crate::core::{TimerEvent, TimerMode, TimerSettings, TimerState};
pub use crate::error::TimerError;
pub use crate::timer::precision::PrecisionTimer;
pub use crate::timer::tick::TickTimer;
//==================================================================================
