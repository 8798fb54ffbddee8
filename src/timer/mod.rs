//! Timers: the lifecycle state machine, its platform-thread dispatcher and
//! the two public facades.
pub mod dispatcher;
pub mod precision;
pub mod tick;
pub mod timer_core;
