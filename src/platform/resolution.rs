//! Process-wide minimum timer resolution requests.
//!
//! A request lowers the resolution used by every [`ThreadPlatform`] timer
//! until it is released. Requests nest: the smallest active one wins, and
//! each request must be released with the same value.
//!
//! [`ThreadPlatform`]: crate::platform::thread_backend::ThreadPlatform
use std::sync::{Mutex, PoisonError};

use crate::error::TimerError;
use crate::platform::thread_backend::ThreadPlatform;
use crate::platform::TimerPlatform;

static ACTIVE_REQUESTS: Mutex<Vec<u32>> = Mutex::new(Vec::new());

/// Register a minimum resolution request (ms).
///
/// Fails with [`TimerError::ResolutionNotSupported`] when the value is not in
/// the host's `[min_period_ms, max_period_ms]` range.
pub fn request_minimum_resolution(resolution_ms: u32) -> Result<(), TimerError> {
    let caps = ThreadPlatform::shared().capabilities()?;
    if resolution_ms < caps.min_period_ms || resolution_ms > caps.max_period_ms {
        return Err(TimerError::ResolutionNotSupported {
            resolution: resolution_ms,
        });
    }
    requests().push(resolution_ms);
    tracing::debug!(resolution_ms, "minimum timer resolution requested");
    Ok(())
}

/// Release a request made with [`request_minimum_resolution`].
pub fn release_minimum_resolution(resolution_ms: u32) -> Result<(), TimerError> {
    let mut active = requests();
    let Some(position) = active.iter().position(|&r| r == resolution_ms) else {
        return Err(TimerError::ResolutionNotSupported {
            resolution: resolution_ms,
        });
    };
    active.swap_remove(position);
    tracing::debug!(resolution_ms, "minimum timer resolution released");
    Ok(())
}

/// Smallest active request, if any.
pub fn active_minimum_resolution() -> Option<u32> {
    requests().iter().copied().min()
}

/// Resolution a timer asking for `requested_ms` actually gets.
pub(crate) fn effective_resolution(requested_ms: u32) -> u32 {
    match active_minimum_resolution() {
        Some(floor) => requested_ms.min(floor),
        None => requested_ms,
    }
}

fn requests() -> std::sync::MutexGuard<'static, Vec<u32>> {
    ACTIVE_REQUESTS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Values are unique to each test: requests are global to the process.

    #[test]
    fn out_of_range_request_is_refused() {
        assert_eq!(
            request_minimum_resolution(0),
            Err(TimerError::ResolutionNotSupported { resolution: 0 })
        );
        assert!(request_minimum_resolution(2_000_000).is_err());
    }

    #[test]
    fn releasing_an_unknown_request_fails() {
        assert_eq!(
            release_minimum_resolution(777),
            Err(TimerError::ResolutionNotSupported { resolution: 777 })
        );
    }

    #[test]
    fn active_request_caps_effective_resolution() {
        request_minimum_resolution(1).unwrap();
        assert_eq!(effective_resolution(5), 1);
        assert_eq!(effective_resolution(0), 0);
        release_minimum_resolution(1).unwrap();
    }
}
