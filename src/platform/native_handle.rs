//! Exclusive owner of one live native timer id.
use crate::core::{HandleId, TimerSettings};
use crate::error::TimerError;
use crate::platform::{NativeCallback, TimerPlatform};

/// A live platform timer. Not `Clone`: exactly one owner exists between
/// creation and [`cancel`](Self::cancel), which consumes the handle so it
/// cannot be cancelled twice.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped handle leaves the native timer armed"]
pub struct NativeTimerHandle {
    id: HandleId,
}

impl NativeTimerHandle {
    /// Arm a native timer with already validated settings.
    pub fn create<P: TimerPlatform + ?Sized>(
        platform: &P,
        settings: &TimerSettings,
        callback: NativeCallback,
    ) -> Result<Self, TimerError> {
        platform
            .create(
                settings.period_ms,
                settings.resolution_ms,
                settings.mode,
                callback,
            )
            .map(|id| Self { id })
            .ok_or(TimerError::StartFailed)
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Best-effort cancel: a platform failure is logged and swallowed so the
    /// owner always ends up in a recoverable state.
    pub fn cancel<P: TimerPlatform + ?Sized>(self, platform: &P) {
        match platform.cancel(self.id) {
            Ok(()) => tracing::trace!(handle = %self.id, "native timer cancelled"),
            Err(err) => tracing::warn!(handle = %self.id, error = %err, "native timer cancel failed"),
        }
    }
}
