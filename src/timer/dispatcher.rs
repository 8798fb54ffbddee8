//! Code run on the platform thread for every firing.
//!
//! 1. Lock, check the firing belongs to the live handle, snapshot the action,
//!    context and mode, unlock.
//! 2. Run the action, then the `Tick` subscribers, with no lock held.
//!    Failures stay here: they are logged, and the firing is counted once in
//!    `failed_ticks` however many callbacks failed.
//! 3. One-shot only: relock and return to `Idle` if the handle that fired is
//!    still the live one. Otherwise a concurrent stop/start/dispose already
//!    owns the transition and nothing is done.
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::core::{HandleId, TickInfo, TimerAction, TimerEvent, TimerMode};
use crate::error::TimerError;
use crate::platform::{NativeCallback, TimerPlatform};
use crate::timer::timer_core::Shared;

/// Wrap `shared` into the callback given to the platform. The platform's
/// clone keeps the state alive for as long as the native timer can fire.
pub(crate) fn native_callback<P: TimerPlatform>(shared: Arc<Shared<P>>) -> NativeCallback {
    Arc::new(move |handle| dispatch(&shared, handle))
}

struct Snapshot {
    action: Option<TimerAction>,
    mode: TimerMode,
    tick: TickInfo,
}

pub(crate) fn dispatch<P: TimerPlatform>(shared: &Shared<P>, handle: HandleId) {
    let Some(snapshot) = take_snapshot(shared, handle) else {
        tracing::trace!(%handle, "stale firing ignored");
        return;
    };

    let mut failed = false;
    if let Some(action) = &snapshot.action {
        let outcome = catch_unwind(AssertUnwindSafe(|| action(&snapshot.tick)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        if let Some(reason) = failure {
            failed = true;
            let err = TimerError::CallbackFailed { reason };
            tracing::error!(%handle, sequence = snapshot.tick.sequence, error = %err, "timer action failed");
        }
    }

    let sequence = snapshot.tick.sequence;
    let panicked = shared.notifier.emit(&TimerEvent::Tick(snapshot.tick));
    if failed || panicked > 0 {
        shared.failed_ticks.fetch_add(1, Ordering::Relaxed);
    }
    tracing::trace!(%handle, sequence, "tick dispatched");

    if snapshot.mode == TimerMode::OneShot {
        finish_one_shot(shared, handle);
    }
}

fn take_snapshot<P: TimerPlatform>(shared: &Shared<P>, handle: HandleId) -> Option<Snapshot> {
    let mut inner = shared.lock();
    if inner.lifecycle.live_id() != Some(handle) {
        return None;
    }
    inner.sequence += 1;
    Some(Snapshot {
        action: inner.action.clone(),
        mode: inner.settings.mode,
        tick: TickInfo {
            handle,
            sequence: inner.sequence,
            context: inner.context.clone(),
        },
    })
}

fn finish_one_shot<P: TimerPlatform>(shared: &Shared<P>, handle: HandleId) {
    let released = {
        let mut inner = shared.lock();
        if inner.lifecycle.live_id() == Some(handle) {
            inner.take_running()
        } else {
            None
        }
    };
    match released {
        Some(native) => shared.release(native),
        None => tracing::trace!(%handle, "one-shot already stopped elsewhere"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "action panicked".to_owned()
    }
}
