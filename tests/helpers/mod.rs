/// Test doubles: a scripted timer platform that fires only when told to.
use precision_tick::core::{HandleId, TimerCapabilities, TimerEvent, TimerMode};
use precision_tick::error::PlatformError;
use precision_tick::platform::capabilities::CapabilityProbe;
use precision_tick::platform::{NativeCallback, TimerPlatform};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
pub const MOCK_CAPS: TimerCapabilities = TimerCapabilities {
    min_period_ms: 1,
    max_period_ms: 1_000,
};

/// Parameters a native timer was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub struct Armed {
    pub period_ms: u32,
    pub resolution_ms: u32,
    pub mode: TimerMode,
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    refuse_create: bool,
    fail_cancel: bool,
    /// Refuse creation once this many timers are live.
    live_limit: Option<usize>,
    live: HashMap<HandleId, Armed>,
    /// Every callback ever handed over, so stale ids can still be fired.
    callbacks: HashMap<HandleId, NativeCallback>,
    cancels: HashMap<HandleId, usize>,
    created: usize,
}

/// In-memory platform reproducing the `TimerPlatform` contract.
pub struct MockPlatform {
    caps: Result<TimerCapabilities, PlatformError>,
    probe: CapabilityProbe,
    queries: AtomicUsize,
    state: Mutex<MockState>,
}

#[allow(dead_code)]
impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Self::with_caps(Ok(MOCK_CAPS))
    }

    pub fn with_caps(caps: Result<TimerCapabilities, PlatformError>) -> Arc<Self> {
        Arc::new(Self {
            caps,
            probe: CapabilityProbe::new(),
            queries: AtomicUsize::new(0),
            state: Mutex::new(MockState {
                next_id: 1,
                ..MockState::default()
            }),
        })
    }

    pub fn refuse_create(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_create = refuse;
    }

    /// Cap the number of simultaneously live timers, like a platform with a
    /// fixed timer table.
    pub fn limit_live(&self, limit: Option<usize>) {
        self.state.lock().unwrap().live_limit = limit;
    }

    /// Make cancel report a failure (the timer is still disarmed).
    pub fn fail_cancel(&self, fail: bool) {
        self.state.lock().unwrap().fail_cancel = fail;
    }

    /// Invoke the callback registered for `id` on the calling thread, as the
    /// platform would. Returns whether `id` was live at that moment.
    pub fn fire(&self, id: HandleId) -> bool {
        let (callback, live) = {
            let state = self.state.lock().unwrap();
            (state.callbacks.get(&id).cloned(), state.live.contains_key(&id))
        };
        if let Some(callback) = callback {
            callback(id);
        }
        live
    }

    /// Fire every live timer once; returns how many fired.
    pub fn fire_all(&self) -> usize {
        let ids = self.live_handles();
        for id in &ids {
            self.fire(*id);
        }
        ids.len()
    }

    pub fn live_handles(&self) -> Vec<HandleId> {
        let mut ids: Vec<_> = self.state.lock().unwrap().live.keys().copied().collect();
        ids.sort_by_key(|id| id.get());
        ids
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// The single live handle; panics unless exactly one timer is armed.
    pub fn only_live(&self) -> HandleId {
        let ids = self.live_handles();
        assert_eq!(ids.len(), 1, "expected exactly one live timer, got {ids:?}");
        ids[0]
    }

    pub fn armed(&self, id: HandleId) -> Option<Armed> {
        self.state.lock().unwrap().live.get(&id).copied()
    }

    pub fn cancel_calls(&self, id: HandleId) -> usize {
        self.state
            .lock()
            .unwrap()
            .cancels
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created
    }

    /// How many times the underlying capability query actually ran.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl TimerPlatform for MockPlatform {
    fn capabilities(&self) -> Result<TimerCapabilities, PlatformError> {
        self.probe.get_or_query(|| {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.caps.clone()
        })
    }

    fn create(
        &self,
        period_ms: u32,
        resolution_ms: u32,
        mode: TimerMode,
        callback: NativeCallback,
    ) -> Option<HandleId> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_create {
            return None;
        }
        if state.live_limit.is_some_and(|limit| state.live.len() >= limit) {
            return None;
        }
        let id = HandleId::new(state.next_id)?;
        state.next_id += 1;
        state.created += 1;
        state.live.insert(
            id,
            Armed {
                period_ms,
                resolution_ms,
                mode,
            },
        );
        state.callbacks.insert(id, callback);
        Some(id)
    }

    fn cancel(&self, handle: HandleId) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        *state.cancels.entry(handle).or_insert(0) += 1;
        if state.live.remove(&handle).is_none() {
            return Err(PlatformError::UnknownHandle(handle.get()));
        }
        if state.fail_cancel {
            return Err(PlatformError::Cancel { status: 97 });
        }
        Ok(())
    }
}

/// Records every event it sees, in order.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber(&self) -> impl Fn(&TimerEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event| {
            let entry = match event {
                TimerEvent::Started => "started".to_owned(),
                TimerEvent::Stopped => "stopped".to_owned(),
                TimerEvent::Tick(tick) => format!("tick{}", tick.sequence),
            };
            events.lock().unwrap().push(entry);
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }
}
