//! Timer lifecycle state machine.
//!
//! One mutex per timer totally orders configuration, `start`, `stop`,
//! `dispose` and the dispatcher's one-shot transition. User code (actions
//! and subscribers) never runs while it is held.
//!
//! The native handle lives inside [`Lifecycle::Running`], so "a live handle
//! exists iff the timer is running" holds by construction.
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::{
    EventContext, HandleId, TimerAction, TimerCapabilities, TimerEvent, TimerMode, TimerSettings,
    TimerState,
};
use crate::error::TimerError;
use crate::notify::{Notifier, SubscriptionId};
use crate::platform::native_handle::NativeTimerHandle;
use crate::platform::thread_backend::ThreadPlatform;
use crate::platform::TimerPlatform;
use crate::timer::dispatcher;

/// Owner side of a timer. Dropping it disposes the timer.
pub struct TimerCore<P: TimerPlatform = ThreadPlatform> {
    shared: Arc<Shared<P>>,
}

/// State reachable from both the owner and the platform callback.
pub(crate) struct Shared<P: TimerPlatform> {
    pub(crate) platform: Arc<P>,
    pub(crate) caps: TimerCapabilities,
    pub(crate) notifier: Notifier,
    pub(crate) failed_ticks: AtomicU64,
    inner: Mutex<Inner>,
}

pub(crate) struct Inner {
    pub(crate) settings: TimerSettings,
    pub(crate) action: Option<TimerAction>,
    pub(crate) context: Option<EventContext>,
    pub(crate) lifecycle: Lifecycle,
    /// Firings dispatched since the last start.
    pub(crate) sequence: u64,
}

pub(crate) enum Lifecycle {
    Idle,
    Running(NativeTimerHandle),
    Disposed,
}

impl Lifecycle {
    fn state(&self) -> TimerState {
        match self {
            Lifecycle::Idle => TimerState::Idle,
            Lifecycle::Running(_) => TimerState::Running,
            Lifecycle::Disposed => TimerState::Disposed,
        }
    }

    pub(crate) fn live_id(&self) -> Option<HandleId> {
        match self {
            Lifecycle::Running(handle) => Some(handle.id()),
            _ => None,
        }
    }
}

impl Inner {
    fn ensure_alive(&self, operation: &'static str) -> Result<(), TimerError> {
        match self.lifecycle {
            Lifecycle::Disposed => Err(TimerError::Disposed { operation }),
            _ => Ok(()),
        }
    }

    fn ensure_idle(&self) -> Result<(), TimerError> {
        match self.lifecycle {
            Lifecycle::Running(_) => Err(TimerError::TimerRunning),
            _ => Ok(()),
        }
    }

    /// Take the live handle, leaving the timer `Idle`.
    pub(crate) fn take_running(&mut self) -> Option<NativeTimerHandle> {
        match mem::replace(&mut self.lifecycle, Lifecycle::Idle) {
            Lifecycle::Running(handle) => Some(handle),
            other => {
                self.lifecycle = other;
                None
            }
        }
    }
}

impl<P: TimerPlatform> Shared<P> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves `Inner` consistent, so a poisoned
        // lock is still safe to use.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a native timer for the current settings. Caller holds the lock.
    fn arm(self: &Arc<Self>, inner: &mut Inner) -> Result<HandleId, TimerError> {
        let handle = NativeTimerHandle::create(
            self.platform.as_ref(),
            &inner.settings,
            dispatcher::native_callback(Arc::clone(self)),
        )?;
        let id = handle.id();
        inner.sequence = 0;
        inner.lifecycle = Lifecycle::Running(handle);
        Ok(id)
    }

    /// Cancel a handle already detached from the lifecycle, then notify.
    /// Caller must not hold the lock.
    pub(crate) fn release(&self, handle: NativeTimerHandle) {
        let id = handle.id();
        handle.cancel(self.platform.as_ref());
        tracing::debug!(handle = %id, "timer stopped");
        self.notifier.emit(&TimerEvent::Stopped);
    }

    fn announce_start(&self, id: HandleId) {
        tracing::debug!(handle = %id, "timer started");
        self.notifier.emit(&TimerEvent::Started);
    }
}

impl TimerCore<ThreadPlatform> {
    /// Timer on the process-wide [`ThreadPlatform`].
    pub fn new() -> Result<Self, TimerError> {
        Self::with_platform(ThreadPlatform::shared())
    }
}

impl<P: TimerPlatform> TimerCore<P> {
    /// Build an `Idle` timer. Fails if the platform cannot report its
    /// capabilities.
    pub fn with_platform(platform: Arc<P>) -> Result<Self, TimerError> {
        let caps = platform.capabilities()?;
        let inner = Inner {
            settings: TimerSettings::defaults_for(&caps),
            action: None,
            context: None,
            lifecycle: Lifecycle::Idle,
            sequence: 0,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                platform,
                caps,
                notifier: Notifier::new(),
                failed_ticks: AtomicU64::new(0),
                inner: Mutex::new(inner),
            }),
        })
    }

    pub fn capabilities(&self) -> TimerCapabilities {
        self.shared.caps
    }

    /// Current lifecycle state. Answers even after disposal.
    pub fn state(&self) -> TimerState {
        self.shared.lock().lifecycle.state()
    }

    pub fn is_running(&self) -> Result<bool, TimerError> {
        let inner = self.shared.lock();
        inner.ensure_alive("check the state of")?;
        Ok(matches!(inner.lifecycle, Lifecycle::Running(_)))
    }

    /// Apply a whole configuration, restarting the timer if it was running.
    ///
    /// The settings are validated first; on `OutOfRange` nothing changes. A
    /// running timer is stopped, reconfigured, then started again iff
    /// `auto_start`. An idle timer is started iff `auto_start`. Returns
    /// whether the timer is running afterwards.
    ///
    /// The old native timer is cancelled before the new one is armed, so a
    /// restart never needs two live handles.
    pub fn configure(
        &self,
        action: Option<TimerAction>,
        settings: TimerSettings,
        auto_start: bool,
    ) -> Result<bool, TimerError> {
        let previous = {
            let mut inner = self.shared.lock();
            inner.ensure_alive("configure")?;
            settings.validate(&self.shared.caps)?;

            let previous = inner.take_running();
            inner.settings = settings;
            inner.action = action;
            let Some(previous) = previous else {
                if !auto_start {
                    return Ok(false);
                }
                let id = self.shared.arm(&mut inner)?;
                drop(inner);
                self.shared.announce_start(id);
                return Ok(true);
            };
            previous
        };

        self.shared.release(previous);
        if !auto_start {
            return Ok(false);
        }

        let id = {
            let mut inner = self.shared.lock();
            inner.ensure_alive("configure")?;
            // Started by another caller while unlocked; it runs the new settings.
            if matches!(inner.lifecycle, Lifecycle::Running(_)) {
                return Ok(true);
            }
            self.shared.arm(&mut inner)?
        };
        self.shared.announce_start(id);
        Ok(true)
    }

    /// Arm the native timer. `Ok(false)` if it was already running.
    ///
    /// On [`TimerError::StartFailed`] the timer stays `Idle` and can be
    /// reconfigured and started again.
    pub fn start(&self) -> Result<bool, TimerError> {
        let id = {
            let mut inner = self.shared.lock();
            inner.ensure_alive("start")?;
            if matches!(inner.lifecycle, Lifecycle::Running(_)) {
                return Ok(false);
            }
            self.shared.arm(&mut inner)?
        };
        self.shared.announce_start(id);
        Ok(true)
    }

    /// Replace the event context, then start.
    pub fn start_with_context(&self, context: EventContext) -> Result<bool, TimerError> {
        let id = {
            let mut inner = self.shared.lock();
            inner.ensure_alive("start")?;
            inner.ensure_idle()?;
            inner.context = Some(context);
            self.shared.arm(&mut inner)?
        };
        self.shared.announce_start(id);
        Ok(true)
    }

    /// Cancel the native timer. No-op when not running.
    ///
    /// Returns once no new firing can begin; a firing already running user
    /// code on the platform thread may still complete afterwards.
    pub fn stop(&self) -> Result<(), TimerError> {
        let handle = {
            let mut inner = self.shared.lock();
            inner.ensure_alive("stop")?;
            inner.take_running()
        };
        if let Some(handle) = handle {
            self.shared.release(handle);
        }
        Ok(())
    }

    pub fn settings(&self) -> Result<TimerSettings, TimerError> {
        let inner = self.shared.lock();
        inner.ensure_alive("read the settings of")?;
        Ok(inner.settings)
    }

    pub fn period(&self) -> Result<u32, TimerError> {
        let inner = self.shared.lock();
        inner.ensure_alive("read the period of")?;
        Ok(inner.settings.period_ms)
    }

    pub fn set_period(&self, period_ms: u32) -> Result<(), TimerError> {
        self.mutate(
            "change the period of",
            |caps| caps.check_period(period_ms),
            |inner, period_ms| inner.settings.period_ms = period_ms,
        )
    }

    pub fn resolution(&self) -> Result<u32, TimerError> {
        let inner = self.shared.lock();
        inner.ensure_alive("read the resolution of")?;
        Ok(inner.settings.resolution_ms)
    }

    pub fn set_resolution(&self, resolution_ms: u32) -> Result<(), TimerError> {
        self.mutate(
            "change the resolution of",
            |caps| caps.check_resolution(resolution_ms),
            |inner, resolution_ms| inner.settings.resolution_ms = resolution_ms,
        )
    }

    pub fn mode(&self) -> Result<TimerMode, TimerError> {
        let inner = self.shared.lock();
        inner.ensure_alive("read the mode of")?;
        Ok(inner.settings.mode)
    }

    pub fn set_mode(&self, mode: TimerMode) -> Result<(), TimerError> {
        self.mutate(
            "change the mode of",
            |_| Ok(mode),
            |inner, mode| inner.settings.mode = mode,
        )
    }

    /// `true` for `Periodic`, `false` for `OneShot`.
    pub fn is_periodic(&self) -> Result<bool, TimerError> {
        self.mode().map(TimerMode::is_periodic)
    }

    pub fn set_auto_reset(&self, periodic: bool) -> Result<(), TimerError> {
        self.set_mode(TimerMode::from_auto_reset(periodic))
    }

    pub fn event_context(&self) -> Result<Option<EventContext>, TimerError> {
        let inner = self.shared.lock();
        inner.ensure_alive("read the event context of")?;
        Ok(inner.context.clone())
    }

    pub fn set_event_context(&self, context: EventContext) -> Result<(), TimerError> {
        self.mutate(
            "change the event context of",
            |_| Ok(context),
            |inner, context| inner.context = Some(context),
        )
    }

    /// Replace (or clear, with `None`) the action run on every firing.
    pub fn set_action(&self, action: Option<TimerAction>) -> Result<(), TimerError> {
        self.mutate(
            "change the action of",
            |_| Ok(action),
            |inner, action| inner.action = action,
        )
    }

    pub fn has_action(&self) -> Result<bool, TimerError> {
        let inner = self.shared.lock();
        inner.ensure_alive("read the action of")?;
        Ok(inner.action.is_some())
    }

    /// Register a notification subscriber.
    pub fn subscribe<F>(&self, subscriber: F) -> Result<SubscriptionId, TimerError>
    where
        F: Fn(&TimerEvent) + Send + Sync + 'static,
    {
        // Held across the insert so a concurrent dispose cannot clear the
        // list between the check and the push.
        let inner = self.shared.lock();
        inner.ensure_alive("subscribe to")?;
        Ok(self.shared.notifier.subscribe(subscriber))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, TimerError> {
        let inner = self.shared.lock();
        inner.ensure_alive("unsubscribe from")?;
        Ok(self.shared.notifier.unsubscribe(id))
    }

    /// Firings where the action or a `Tick` subscriber failed.
    pub fn failed_ticks(&self) -> u64 {
        self.shared.failed_ticks.load(Ordering::Relaxed)
    }

    /// Stop if running, drop the action, context and subscriptions, and mark
    /// the timer disposed. A second call fails with [`TimerError::Disposed`].
    pub fn dispose(&self) -> Result<(), TimerError> {
        let (handle, action, context) = {
            let mut inner = self.shared.lock();
            inner.ensure_alive("dispose")?;
            let handle = inner.take_running();
            inner.lifecycle = Lifecycle::Disposed;
            (handle, inner.action.take(), inner.context.take())
        };
        if let Some(handle) = handle {
            self.shared.release(handle);
        }
        self.shared.notifier.clear();
        // User values are dropped outside the lock.
        drop((action, context));
        tracing::debug!("timer disposed");
        Ok(())
    }

    /// Validate with `check`, then run `apply` on an idle, live timer.
    /// Errors come in the order disposed, out of range, running.
    fn mutate<T>(
        &self,
        operation: &'static str,
        check: impl FnOnce(&TimerCapabilities) -> Result<T, TimerError>,
        apply: impl FnOnce(&mut Inner, T),
    ) -> Result<(), TimerError> {
        let mut inner = self.shared.lock();
        inner.ensure_alive(operation)?;
        let value = check(&self.shared.caps)?;
        inner.ensure_idle()?;
        apply(&mut inner, value);
        Ok(())
    }
}

impl<P: TimerPlatform> Drop for TimerCore<P> {
    fn drop(&mut self) {
        if self.state() != TimerState::Disposed {
            let _ = self.dispose();
        }
    }
}

impl<P: TimerPlatform> std::fmt::Debug for TimerCore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("TimerCore")
            .field("state", &inner.lifecycle.state())
            .field("settings", &inner.settings)
            .field("has_action", &inner.action.is_some())
            .field("handle", &inner.lifecycle.live_id())
            .finish()
    }
}
