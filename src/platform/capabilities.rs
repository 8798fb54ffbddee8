//! One-time capability discovery. The first query is cached, success or
//! failure, and every later call returns the cached answer.
use std::sync::OnceLock;

use crate::core::TimerCapabilities;
use crate::error::PlatformError;

/// Lazily populated, never mutated capability cache.
///
/// Declare it `static` to make the query process-wide:
///
/// ```rust
/// use precision_tick::core::TimerCapabilities;
/// use precision_tick::platform::capabilities::CapabilityProbe;
///
/// static PROBE: CapabilityProbe = CapabilityProbe::new();
///
/// let caps = PROBE.get_or_query(|| {
///     Ok(TimerCapabilities { min_period_ms: 1, max_period_ms: 1_000 })
/// });
/// assert_eq!(caps.unwrap().max_period_ms, 1_000);
/// ```
#[derive(Debug, Default)]
pub struct CapabilityProbe {
    cached: OnceLock<Result<TimerCapabilities, PlatformError>>,
}

impl CapabilityProbe {
    pub const fn new() -> Self {
        Self {
            cached: OnceLock::new(),
        }
    }

    /// Return the cached bounds, running `query` on first use only.
    /// Bounds violating `1 <= min <= max` are cached as an error.
    pub fn get_or_query<F>(&self, query: F) -> Result<TimerCapabilities, PlatformError>
    where
        F: FnOnce() -> Result<TimerCapabilities, PlatformError>,
    {
        self.cached
            .get_or_init(|| query().and_then(validate))
            .clone()
    }

    /// Cached answer, if the query already ran.
    pub fn cached(&self) -> Option<Result<TimerCapabilities, PlatformError>> {
        self.cached.get().cloned()
    }
}

fn validate(caps: TimerCapabilities) -> Result<TimerCapabilities, PlatformError> {
    if caps.min_period_ms == 0 || caps.min_period_ms > caps.max_period_ms {
        return Err(PlatformError::InvalidCapabilities {
            min: caps.min_period_ms,
            max: caps.max_period_ms,
        });
    }
    Ok(caps)
}
