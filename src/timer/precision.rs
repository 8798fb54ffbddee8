//! Full-featured timer: a configurable action plus `Started`, `Stopped` and
//! `Tick` notifications.
//!
//! ```rust,no_run
//! use precision_tick::timer::precision::PrecisionTimer;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! let ticks = Arc::new(AtomicU64::new(0));
//! let counter = Arc::clone(&ticks);
//!
//! let timer = PrecisionTimer::new()?;
//! // Every 5 ms, periodic, start right away.
//! timer.set_interval(
//!     move || {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     },
//!     5,
//!     true,
//!     true,
//! )?;
//! std::thread::sleep(std::time::Duration::from_millis(50));
//! timer.stop()?;
//! # Ok::<(), precision_tick::error::TimerError>(())
//! ```
use std::sync::Arc;

use crate::core::{
    EventContext, TickInfo, TimerAction, TimerCapabilities, TimerEvent, TimerMode, TimerSettings,
    TimerState, HIGHEST_RESOLUTION_MS,
};
use crate::error::{ActionError, TimerError};
use crate::notify::SubscriptionId;
use crate::platform::thread_backend::ThreadPlatform;
use crate::platform::TimerPlatform;
use crate::timer::timer_core::TimerCore;

/// Wrap an infallible closure as a [`TimerAction`].
pub fn action<F>(task: F) -> TimerAction
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(move |_: &TickInfo| {
        task();
        Ok(())
    })
}

/// Wrap a closure that sees the tick and may fail.
pub fn fallible_action<F>(task: F) -> TimerAction
where
    F: Fn(&TickInfo) -> Result<(), ActionError> + Send + Sync + 'static,
{
    Arc::new(task)
}

/// Timer facade over [`TimerCore`]. Dropping it disposes the timer.
#[derive(Debug)]
pub struct PrecisionTimer<P: TimerPlatform = ThreadPlatform> {
    core: TimerCore<P>,
}

impl PrecisionTimer<ThreadPlatform> {
    pub fn new() -> Result<Self, TimerError> {
        Self::with_platform(ThreadPlatform::shared())
    }
}

impl<P: TimerPlatform> PrecisionTimer<P> {
    pub fn with_platform(platform: Arc<P>) -> Result<Self, TimerError> {
        Ok(Self {
            core: TimerCore::with_platform(platform)?,
        })
    }

    /// State machine behind the facade.
    pub fn core(&self) -> &TimerCore<P> {
        &self.core
    }

    /// Run `task` every `interval_ms` (or once, with `periodic = false`) at
    /// the highest resolution, starting immediately iff `start`.
    ///
    /// Replaces any previous action. A running timer is restarted.
    pub fn set_interval<F>(
        &self,
        task: F,
        interval_ms: u32,
        start: bool,
        periodic: bool,
    ) -> Result<bool, TimerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let settings = TimerSettings {
            period_ms: interval_ms,
            resolution_ms: HIGHEST_RESOLUTION_MS,
            mode: TimerMode::from_auto_reset(periodic),
        };
        self.core.configure(Some(action(task)), settings, start)
    }

    /// Full configuration entry point; see [`TimerCore::configure`].
    pub fn configure(
        &self,
        action: Option<TimerAction>,
        settings: TimerSettings,
        auto_start: bool,
    ) -> Result<bool, TimerError> {
        self.core.configure(action, settings, auto_start)
    }

    /// Replace the action. Rejected while running.
    pub fn set_action<F>(&self, task: F) -> Result<(), TimerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.core.set_action(Some(action(task)))
    }

    pub fn set_fallible_action<F>(&self, task: F) -> Result<(), TimerError>
    where
        F: Fn(&TickInfo) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.core.set_action(Some(fallible_action(task)))
    }

    pub fn clear_action(&self) -> Result<(), TimerError> {
        self.core.set_action(None)
    }

    pub fn start(&self) -> Result<bool, TimerError> {
        self.core.start()
    }

    pub fn start_with_context(&self, context: EventContext) -> Result<bool, TimerError> {
        self.core.start_with_context(context)
    }

    /// Stop firing. The action and subscriptions are kept for a later start.
    pub fn stop(&self) -> Result<(), TimerError> {
        self.core.stop()
    }

    pub fn is_running(&self) -> Result<bool, TimerError> {
        self.core.is_running()
    }

    pub fn state(&self) -> TimerState {
        self.core.state()
    }

    pub fn capabilities(&self) -> TimerCapabilities {
        self.core.capabilities()
    }

    pub fn interval(&self) -> Result<u32, TimerError> {
        self.core.period()
    }

    pub fn set_interval_ms(&self, interval_ms: u32) -> Result<(), TimerError> {
        self.core.set_period(interval_ms)
    }

    pub fn resolution(&self) -> Result<u32, TimerError> {
        self.core.resolution()
    }

    pub fn set_resolution(&self, resolution_ms: u32) -> Result<(), TimerError> {
        self.core.set_resolution(resolution_ms)
    }

    pub fn is_periodic(&self) -> Result<bool, TimerError> {
        self.core.is_periodic()
    }

    pub fn set_periodic(&self, periodic: bool) -> Result<(), TimerError> {
        self.core.set_auto_reset(periodic)
    }

    pub fn event_context(&self) -> Result<Option<EventContext>, TimerError> {
        self.core.event_context()
    }

    pub fn set_event_context(&self, context: EventContext) -> Result<(), TimerError> {
        self.core.set_event_context(context)
    }

    pub fn subscribe<F>(&self, subscriber: F) -> Result<SubscriptionId, TimerError>
    where
        F: Fn(&TimerEvent) + Send + Sync + 'static,
    {
        self.core.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, TimerError> {
        self.core.unsubscribe(id)
    }

    pub fn on_started<F>(&self, handler: F) -> Result<SubscriptionId, TimerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if matches!(event, TimerEvent::Started) {
                handler();
            }
        })
    }

    pub fn on_stopped<F>(&self, handler: F) -> Result<SubscriptionId, TimerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if matches!(event, TimerEvent::Stopped) {
                handler();
            }
        })
    }

    pub fn on_tick<F>(&self, handler: F) -> Result<SubscriptionId, TimerError>
    where
        F: Fn(&TickInfo) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let TimerEvent::Tick(tick) = event {
                handler(tick);
            }
        })
    }

    /// Firings where the action or a `Tick` subscriber failed.
    pub fn failed_ticks(&self) -> u64 {
        self.core.failed_ticks()
    }

    pub fn dispose(&self) -> Result<(), TimerError> {
        self.core.dispose()
    }
}
