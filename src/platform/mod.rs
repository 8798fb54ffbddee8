//! Platform timer abstraction. A platform creates native timers that call
//! back on threads it owns, cancels them, and reports its period bounds.
//! [`ThreadPlatform`](thread_backend::ThreadPlatform) is the portable
//! implementation used by default.
use std::sync::Arc;

use crate::core::{HandleId, TimerCapabilities, TimerMode};
use crate::error::PlatformError;

pub mod capabilities;
pub mod native_handle;
pub mod resolution;
pub mod thread_backend;

/// Callback handed to [`TimerPlatform::create`]. The platform calls it with
/// the id it returned, on a thread of its own, once per firing.
pub type NativeCallback = Arc<dyn Fn(HandleId) + Send + Sync>;

/// Contract of a native high-resolution timer service.
pub trait TimerPlatform: Send + Sync + 'static {
    /// Report `{min_period_ms, max_period_ms}`. Implementations cache the
    /// answer (see [`capabilities::CapabilityProbe`]); callers may ask often.
    fn capabilities(&self) -> Result<TimerCapabilities, PlatformError>;

    /// Arm a timer. `None` means the platform refused; no callback will run.
    ///
    /// The platform must keep `callback` alive until the timer is cancelled
    /// or, for `OneShot`, has fired.
    fn create(
        &self,
        period_ms: u32,
        resolution_ms: u32,
        mode: TimerMode,
        callback: NativeCallback,
    ) -> Option<HandleId>;

    /// Disarm a timer. Must not wait for an in-flight callback: it may be
    /// called from inside that callback.
    fn cancel(&self, handle: HandleId) -> Result<(), PlatformError>;
}
