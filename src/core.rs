//! Core data types shared by the timer state machine, the facades and the
//! platform backends: modes, lifecycle states, capability bounds, settings
//! and the events handed to subscribers.
use std::any::Any;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::{ActionError, TimerError};

/// Period of the tick-only timer (ms).
pub const TICK_PERIOD_MS: u32 = 1;

/// Resolution requested by the tick-only timer and by `set_interval` (ms).
/// Zero asks the platform for its best accuracy.
pub const HIGHEST_RESOLUTION_MS: u32 = 0;

//==================================================================================TIMER_MODE
/// Whether the timer re-arms itself after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerMode {
    /// Fire exactly once, then return to `Idle`.
    OneShot,
    /// Fire every period until stopped.
    #[default]
    Periodic,
}

impl TimerMode {
    /// Map the "auto reset" flag used by the facades onto a mode.
    pub fn from_auto_reset(periodic: bool) -> Self {
        if periodic {
            TimerMode::Periodic
        } else {
            TimerMode::OneShot
        }
    }

    pub fn is_periodic(self) -> bool {
        self == TimerMode::Periodic
    }
}

//==================================================================================TIMER_STATE
/// Lifecycle state of a timer.
///
/// ```text
/// Idle --start--> Running --stop / one-shot fired--> Idle
///   \________________ dispose ____________________/--> Disposed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Idle,
    Running,
    Disposed,
}

//==================================================================================CAPABILITIES
/// Period bounds reported once by the platform (ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerCapabilities {
    pub min_period_ms: u32,
    pub max_period_ms: u32,
}

impl TimerCapabilities {
    /// Validate a period against `[min_period_ms, max_period_ms]`.
    pub fn check_period(&self, period_ms: u32) -> Result<u32, TimerError> {
        if period_ms < self.min_period_ms || period_ms > self.max_period_ms {
            return Err(TimerError::OutOfRange {
                parameter: "period",
                value: period_ms,
                min: self.min_period_ms,
                max: self.max_period_ms,
            });
        }
        Ok(period_ms)
    }

    /// Validate a resolution against `[0, max_period_ms]`.
    pub fn check_resolution(&self, resolution_ms: u32) -> Result<u32, TimerError> {
        if resolution_ms > self.max_period_ms {
            return Err(TimerError::OutOfRange {
                parameter: "resolution",
                value: resolution_ms,
                min: 0,
                max: self.max_period_ms,
            });
        }
        Ok(resolution_ms)
    }
}

//==================================================================================SETTINGS
/// Validated-on-apply timer configuration: period, resolution and mode.
///
/// The action and user context are carried separately because they are not
/// plain data. Enable the `serde` feature to load settings from a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerSettings {
    pub period_ms: u32,
    pub resolution_ms: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: TimerMode,
}

impl TimerSettings {
    /// Start a fluent builder. Unset fields fall back to the capability
    /// minimum (period, resolution) and `Periodic`.
    pub fn builder() -> TimerSettingsBuilder {
        TimerSettingsBuilder::default()
    }

    /// Defaults used by a freshly constructed timer.
    pub fn defaults_for(caps: &TimerCapabilities) -> Self {
        Self {
            period_ms: caps.min_period_ms,
            resolution_ms: caps.min_period_ms,
            mode: TimerMode::Periodic,
        }
    }

    /// Check both period and resolution against the capability bounds.
    pub fn validate(&self, caps: &TimerCapabilities) -> Result<(), TimerError> {
        caps.check_period(self.period_ms)?;
        caps.check_resolution(self.resolution_ms)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
/// Fluent builder for [`TimerSettings`].
pub struct TimerSettingsBuilder {
    period_ms: Option<u32>,
    resolution_ms: Option<u32>,
    mode: TimerMode,
}

impl TimerSettingsBuilder {
    pub fn period_ms(mut self, period_ms: u32) -> Self {
        self.period_ms = Some(period_ms);
        self
    }

    pub fn resolution_ms(mut self, resolution_ms: u32) -> Self {
        self.resolution_ms = Some(resolution_ms);
        self
    }

    pub fn mode(mut self, mode: TimerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(TimerMode::OneShot)`.
    pub fn one_shot(self) -> Self {
        self.mode(TimerMode::OneShot)
    }

    /// Resolve unset fields against `caps` and validate the result.
    pub fn build(self, caps: &TimerCapabilities) -> Result<TimerSettings, TimerError> {
        let settings = TimerSettings {
            period_ms: self.period_ms.unwrap_or(caps.min_period_ms),
            resolution_ms: self.resolution_ms.unwrap_or(caps.min_period_ms),
            mode: self.mode,
        };
        settings.validate(caps)?;
        Ok(settings)
    }
}

//==================================================================================HANDLE_ID
/// Opaque identifier of a live native timer. Never zero: zero is the
/// platform's failure value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(NonZeroU32);

impl HandleId {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//==================================================================================EVENTS
/// Opaque user value passed back with every tick.
pub type EventContext = Arc<dyn Any + Send + Sync>;

/// User action run on every firing.
pub type TimerAction = Arc<dyn Fn(&TickInfo) -> Result<(), ActionError> + Send + Sync>;

/// Data handed to actions and subscribers for one firing.
#[derive(Clone)]
pub struct TickInfo {
    /// Native handle that fired.
    pub handle: HandleId,
    /// 1-based firing count since the last start.
    pub sequence: u64,
    /// Context registered on the timer, if any.
    pub context: Option<EventContext>,
}

impl TickInfo {
    /// Downcast the registered context.
    pub fn context_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.context.as_deref().and_then(|ctx| ctx.downcast_ref::<T>())
    }
}

impl fmt::Debug for TickInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickInfo")
            .field("handle", &self.handle)
            .field("sequence", &self.sequence)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone)]
pub enum TimerEvent {
    Started,
    Stopped,
    Tick(TickInfo),
}

impl TimerEvent {
    pub fn is_tick(&self) -> bool {
        matches!(self, TimerEvent::Tick(_))
    }
}
