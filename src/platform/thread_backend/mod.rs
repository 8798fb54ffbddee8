//! Portable [`TimerPlatform`] built on `std::thread`.
//!
//! Every native timer gets a dedicated thread that waits for each deadline
//! (`armed_at + n * period`) by parking until a short spin window before it,
//! then spinning on the monotonic clock. The spin window shrinks as the
//! requested resolution grows:
//!
//! | resolution | spin window |
//! |-----------:|------------:|
//! | 0 ms       | 1500 µs     |
//! | 1 ms       | 500 µs      |
//! | ≥ 2 ms     | none        |
//!
//! A timer that falls more than one period behind resynchronises its next
//! deadline to "now + period" instead of firing a burst.
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use crate::core::{HandleId, TimerCapabilities, TimerMode};
use crate::error::PlatformError;
use crate::platform::capabilities::CapabilityProbe;
use crate::platform::resolution::effective_resolution;
use crate::platform::{NativeCallback, TimerPlatform};

/// Shortest period the thread backend accepts (ms).
pub const HOST_MIN_PERIOD_MS: u32 = 1;
/// Longest period the thread backend accepts (ms).
pub const HOST_MAX_PERIOD_MS: u32 = 1_000_000;
/// Live timers allowed per platform instance; creation beyond it fails.
pub const MAX_LIVE_TIMERS: usize = 64;

static HOST_CAPABILITIES: CapabilityProbe = CapabilityProbe::new();
static SHARED_PLATFORM: OnceLock<Arc<ThreadPlatform>> = OnceLock::new();

/// Thread-per-timer platform.
#[derive(Debug)]
pub struct ThreadPlatform {
    registry: Arc<Registry>,
}

#[derive(Debug)]
struct Registry {
    next_id: AtomicU32,
    max_live: usize,
    slots: Mutex<HashMap<HandleId, Arc<Slot>>>,
}

/// Per-timer shared flag between the owner and its timer thread.
#[derive(Debug, Default)]
struct Slot {
    cancelled: AtomicBool,
    thread: OnceLock<Thread>,
}

impl ThreadPlatform {
    /// Independent platform with its own registry and the default limit.
    pub fn new() -> Self {
        Self::with_max_live_timers(MAX_LIVE_TIMERS)
    }

    pub fn with_max_live_timers(max_live: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU32::new(1),
                max_live,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Process-wide instance used by the facades' default constructors.
    pub fn shared() -> Arc<ThreadPlatform> {
        Arc::clone(SHARED_PLATFORM.get_or_init(|| Arc::new(ThreadPlatform::new())))
    }

    /// Number of timers currently armed on this platform.
    pub fn live_timers(&self) -> usize {
        self.registry.slots().len()
    }
}

impl Default for ThreadPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    fn slots(&self) -> MutexGuard<'_, HashMap<HandleId, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an unused non-zero id and register its slot.
    fn register(&self, slot: Arc<Slot>) -> Option<HandleId> {
        let mut slots = self.slots();
        if slots.len() >= self.max_live {
            return None;
        }
        loop {
            let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = HandleId::new(raw) {
                if !slots.contains_key(&id) {
                    slots.insert(id, slot);
                    return Some(id);
                }
            }
        }
    }

    /// Drop `id` only if it still maps to `slot` (the id may have been reused).
    fn retire(&self, id: HandleId, slot: &Arc<Slot>) {
        let mut slots = self.slots();
        if slots.get(&id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(&id);
        }
    }
}

impl TimerPlatform for ThreadPlatform {
    fn capabilities(&self) -> Result<TimerCapabilities, PlatformError> {
        HOST_CAPABILITIES.get_or_query(|| {
            Ok(TimerCapabilities {
                min_period_ms: HOST_MIN_PERIOD_MS,
                max_period_ms: HOST_MAX_PERIOD_MS,
            })
        })
    }

    fn create(
        &self,
        period_ms: u32,
        resolution_ms: u32,
        mode: TimerMode,
        callback: NativeCallback,
    ) -> Option<HandleId> {
        if period_ms == 0 {
            return None;
        }
        let slot = Arc::new(Slot::default());
        let id = self.registry.register(Arc::clone(&slot))?;

        let schedule = Schedule {
            id,
            period: Duration::from_millis(u64::from(period_ms)),
            spin_window: spin_window(effective_resolution(resolution_ms)),
            mode,
        };
        let thread_slot = Arc::clone(&slot);
        let registry = Arc::clone(&self.registry);
        let spawned = thread::Builder::new()
            .name(format!("precision-tick-{}", id.get()))
            .spawn(move || {
                schedule.run(&thread_slot, &callback);
                registry.retire(schedule.id, &thread_slot);
            });

        match spawned {
            Ok(join) => {
                let _ = slot.thread.set(join.thread().clone());
                tracing::debug!(handle = %id, period_ms, resolution_ms, ?mode, "thread timer armed");
                Some(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "unable to spawn timer thread");
                self.registry.retire(id, &slot);
                None
            }
        }
    }

    fn cancel(&self, handle: HandleId) -> Result<(), PlatformError> {
        let slot = self
            .registry
            .slots()
            .remove(&handle)
            .ok_or(PlatformError::UnknownHandle(handle.get()))?;
        slot.cancelled.store(true, Ordering::Release);
        if let Some(thread) = slot.thread.get() {
            thread.unpark();
        }
        Ok(())
    }
}

/// Spin window for an effective resolution (ms).
fn spin_window(resolution_ms: u32) -> Duration {
    match resolution_ms {
        0 => Duration::from_micros(1_500),
        1 => Duration::from_micros(500),
        _ => Duration::ZERO,
    }
}

struct Schedule {
    id: HandleId,
    period: Duration,
    spin_window: Duration,
    mode: TimerMode,
}

impl Schedule {
    fn run(&self, slot: &Slot, callback: &NativeCallback) {
        let mut deadline = Instant::now() + self.period;
        while self.wait_until(deadline, &slot.cancelled) {
            if catch_unwind(AssertUnwindSafe(|| callback(self.id))).is_err() {
                tracing::error!(handle = %self.id, "timer callback panicked");
            }
            if self.mode == TimerMode::OneShot {
                break;
            }
            deadline += self.period;
            let now = Instant::now();
            if now > deadline + self.period {
                tracing::trace!(handle = %self.id, "timer fell behind, resynchronising");
                deadline = now + self.period;
            }
        }
    }

    /// Block until `deadline`. Returns `false` if cancelled first.
    fn wait_until(&self, deadline: Instant, cancelled: &AtomicBool) -> bool {
        loop {
            if cancelled.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let remaining = deadline - now;
            if remaining > self.spin_window {
                thread::park_timeout(remaining - self.spin_window);
            } else {
                std::hint::spin_loop();
            }
        }
    }
}
