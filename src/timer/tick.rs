//! Tick-only event timer: fixed 1 ms period, no action, no configuration.
//!
//! The dispatch path takes no lock. It compares the firing handle with one
//! atomic and hands subscribers a context captured at start, which cannot
//! change while the timer runs. A mutex only serialises `start`, `stop` and
//! `dispose` against each other.
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::{
    EventContext, HandleId, TickInfo, TimerEvent, TimerMode, TimerSettings, TimerState,
    HIGHEST_RESOLUTION_MS, TICK_PERIOD_MS,
};
use crate::error::TimerError;
use crate::notify::{Notifier, SubscriptionId};
use crate::platform::native_handle::NativeTimerHandle;
use crate::platform::thread_backend::ThreadPlatform;
use crate::platform::{NativeCallback, TimerPlatform};

const TICK_SETTINGS: TimerSettings = TimerSettings {
    period_ms: TICK_PERIOD_MS,
    resolution_ms: HIGHEST_RESOLUTION_MS,
    mode: TimerMode::Periodic,
};

/// No handle is live.
const NO_HANDLE: u32 = 0;

pub struct TickTimer<P: TimerPlatform = ThreadPlatform> {
    shared: Arc<TickShared<P>>,
}

struct TickShared<P: TimerPlatform> {
    platform: Arc<P>,
    notifier: Notifier,
    /// Raw id of the live handle, `NO_HANDLE` when idle.
    live: AtomicU32,
    sequence: AtomicU64,
    lifecycle: Mutex<TickLifecycle>,
}

#[derive(Default)]
struct TickLifecycle {
    handle: Option<NativeTimerHandle>,
    context: Option<EventContext>,
    disposed: bool,
}

impl TickLifecycle {
    fn ensure_alive(&self, operation: &'static str) -> Result<(), TimerError> {
        if self.disposed {
            return Err(TimerError::Disposed { operation });
        }
        Ok(())
    }
}

impl<P: TimerPlatform> TickShared<P> {
    fn lifecycle(&self) -> MutexGuard<'_, TickLifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, handle: HandleId, context: &Option<EventContext>) {
        if self.live.load(Ordering::Acquire) != handle.get() {
            return;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.notifier.emit(&TimerEvent::Tick(TickInfo {
            handle,
            sequence,
            context: context.clone(),
        }));
    }

    fn release(&self, handle: NativeTimerHandle) {
        handle.cancel(self.platform.as_ref());
        self.notifier.emit(&TimerEvent::Stopped);
    }
}

impl TickTimer<ThreadPlatform> {
    pub fn new() -> Result<Self, TimerError> {
        Self::with_platform(ThreadPlatform::shared())
    }
}

impl<P: TimerPlatform> TickTimer<P> {
    /// Fails if the platform cannot report capabilities or cannot do 1 ms.
    pub fn with_platform(platform: Arc<P>) -> Result<Self, TimerError> {
        TICK_SETTINGS.validate(&platform.capabilities()?)?;
        Ok(Self {
            shared: Arc::new(TickShared {
                platform,
                notifier: Notifier::new(),
                live: AtomicU32::new(NO_HANDLE),
                sequence: AtomicU64::new(0),
                lifecycle: Mutex::new(TickLifecycle::default()),
            }),
        })
    }

    pub fn state(&self) -> TimerState {
        let lifecycle = self.shared.lifecycle();
        if lifecycle.disposed {
            TimerState::Disposed
        } else if lifecycle.handle.is_some() {
            TimerState::Running
        } else {
            TimerState::Idle
        }
    }

    pub fn is_running(&self) -> Result<bool, TimerError> {
        let lifecycle = self.shared.lifecycle();
        lifecycle.ensure_alive("check the state of")?;
        Ok(lifecycle.handle.is_some())
    }

    /// Start ticking every millisecond. `Ok(false)` if already running.
    pub fn start(&self) -> Result<bool, TimerError> {
        let id = {
            let mut lifecycle = self.shared.lifecycle();
            lifecycle.ensure_alive("start")?;
            if lifecycle.handle.is_some() {
                return Ok(false);
            }

            let shared = Arc::clone(&self.shared);
            let context = lifecycle.context.clone();
            let callback: NativeCallback =
                Arc::new(move |handle| shared.dispatch(handle, &context));
            let handle =
                NativeTimerHandle::create(self.shared.platform.as_ref(), &TICK_SETTINGS, callback)?;
            let id = handle.id();
            self.shared.sequence.store(0, Ordering::Relaxed);
            // A firing that beats this store is dropped as stale.
            self.shared.live.store(id.get(), Ordering::Release);
            lifecycle.handle = Some(handle);
            id
        };
        tracing::debug!(handle = %id, "tick timer started");
        self.shared.notifier.emit(&TimerEvent::Started);
        Ok(true)
    }

    pub fn stop(&self) -> Result<(), TimerError> {
        let handle = {
            let mut lifecycle = self.shared.lifecycle();
            lifecycle.ensure_alive("stop")?;
            self.shared.live.store(NO_HANDLE, Ordering::Release);
            lifecycle.handle.take()
        };
        if let Some(handle) = handle {
            tracing::debug!(handle = %handle.id(), "tick timer stopped");
            self.shared.release(handle);
        }
        Ok(())
    }

    pub fn event_context(&self) -> Result<Option<EventContext>, TimerError> {
        let lifecycle = self.shared.lifecycle();
        lifecycle.ensure_alive("read the event context of")?;
        Ok(lifecycle.context.clone())
    }

    /// Rejected while running: the dispatcher holds the context captured at
    /// start.
    pub fn set_event_context(&self, context: EventContext) -> Result<(), TimerError> {
        let mut lifecycle = self.shared.lifecycle();
        lifecycle.ensure_alive("change the event context of")?;
        if lifecycle.handle.is_some() {
            return Err(TimerError::TimerRunning);
        }
        lifecycle.context = Some(context);
        Ok(())
    }

    pub fn subscribe<F>(&self, subscriber: F) -> Result<SubscriptionId, TimerError>
    where
        F: Fn(&TimerEvent) + Send + Sync + 'static,
    {
        let lifecycle = self.shared.lifecycle();
        lifecycle.ensure_alive("subscribe to")?;
        Ok(self.shared.notifier.subscribe(subscriber))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, TimerError> {
        let lifecycle = self.shared.lifecycle();
        lifecycle.ensure_alive("unsubscribe from")?;
        Ok(self.shared.notifier.unsubscribe(id))
    }

    pub fn dispose(&self) -> Result<(), TimerError> {
        let (handle, context) = {
            let mut lifecycle = self.shared.lifecycle();
            lifecycle.ensure_alive("dispose")?;
            lifecycle.disposed = true;
            self.shared.live.store(NO_HANDLE, Ordering::Release);
            (lifecycle.handle.take(), lifecycle.context.take())
        };
        if let Some(handle) = handle {
            self.shared.release(handle);
        }
        self.shared.notifier.clear();
        drop(context);
        tracing::debug!("tick timer disposed");
        Ok(())
    }
}

impl<P: TimerPlatform> Drop for TickTimer<P> {
    fn drop(&mut self) {
        if self.state() != TimerState::Disposed {
            let _ = self.dispose();
        }
    }
}

impl<P: TimerPlatform> std::fmt::Debug for TickTimer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickTimer")
            .field("state", &self.state())
            .field("live", &self.shared.live.load(Ordering::Relaxed))
            .finish()
    }
}
