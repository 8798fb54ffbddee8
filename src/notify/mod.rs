//! Subscription list for `Started` / `Stopped` / `Tick` notifications.
//!
//! Subscribers are invoked from whichever thread raised the event (the
//! caller of `start`/`stop`, or the platform thread for ticks) and never
//! while a timer lock is held. A subscriber may therefore call back into the
//! timer, including `stop` and `dispose`.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::TimerEvent;

pub mod channel;

/// Callback registered with a [`Notifier`].
pub type Subscriber = Arc<dyn Fn(&TimerEvent) + Send + Sync>;

/// Token returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct Notifier {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; it receives every event in emission order.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&TimerEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().push((id, Arc::new(subscriber)));
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.write();
        let before = subscribers.len();
        subscribers.retain(|(registered, _)| *registered != id);
        subscribers.len() != before
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Deliver `event` to a snapshot of the current subscribers.
    ///
    /// A panicking subscriber is logged and skipped; the others still run.
    /// Returns how many subscribers panicked.
    pub fn emit(&self, event: &TimerEvent) -> usize {
        let snapshot: Vec<Subscriber> = self
            .read()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();

        let mut panicked = 0;
        for subscriber in snapshot {
            if catch_unwind(AssertUnwindSafe(|| subscriber(event))).is_err() {
                tracing::error!(?event, "timer event subscriber panicked");
                panicked += 1;
            }
        }
        panicked
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.subscribers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emits_in_subscription_order() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            notifier.subscribe(move |_| seen.lock().unwrap().push(tag));
        }
        notifier.emit(&TimerEvent::Started);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_subscriber() {
        let notifier = Notifier::new();
        let first = notifier.subscribe(|_| {});
        let _second = notifier.subscribe(|_| {});
        assert!(notifier.unsubscribe(first));
        assert!(!notifier.unsubscribe(first));
        assert_eq!(notifier.len(), 1);
        notifier.clear();
        assert!(notifier.is_empty());
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let notifier = Notifier::new();
        let reached = Arc::new(Mutex::new(false));
        notifier.subscribe(|_| panic!("bad subscriber"));
        let flag = Arc::clone(&reached);
        notifier.subscribe(move |_| *flag.lock().unwrap() = true);

        assert_eq!(notifier.emit(&TimerEvent::Stopped), 1);
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn subscriber_may_subscribe_during_emit() {
        let notifier = Arc::new(Notifier::new());
        let inner = Arc::clone(&notifier);
        notifier.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        notifier.emit(&TimerEvent::Started);
        assert_eq!(notifier.len(), 2);
    }
}
