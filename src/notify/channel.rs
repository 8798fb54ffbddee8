//! Bridge from timer notifications to an [`embassy_sync::channel::Channel`],
//! for consumers that prefer to `await` events instead of registering
//! callbacks.
//!
//! The channel is provided by the application, usually from a `StaticCell`,
//! so the library never allocates it.
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};

use crate::core::TimerEvent;

/// Channel type accepted by [`channel_forwarder`].
pub type EventChannel<const N: usize> = Channel<CriticalSectionRawMutex, TimerEvent, N>;

/// Build a subscriber that pushes every event into `channel`.
///
/// The platform thread must never block, so a full channel drops the event.
///
/// ```rust,ignore
/// static EVENTS: StaticCell<EventChannel<32>> = StaticCell::new();
/// let events = EVENTS.init(Channel::new());
/// timer.subscribe(channel_forwarder(events))?;
/// let first = events.receive().await;
/// ```
pub fn channel_forwarder<const N: usize>(
    channel: &'static EventChannel<N>,
) -> impl Fn(&TimerEvent) + Send + Sync + 'static {
    move |event| {
        if channel.try_send(event.clone()).is_err() {
            tracing::trace!(?event, capacity = N, "event channel full, dropping timer event");
        }
    }
}
