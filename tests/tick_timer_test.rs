//! `TickTimer` lifecycle and dispatch on a scripted platform.
mod helpers {
    include!("helpers/mod.rs");
}

use helpers::{Armed, EventLog, MockPlatform};
use precision_tick::core::{TimerCapabilities, TimerMode, TimerState};
use precision_tick::error::TimerError;
use precision_tick::timer::tick::TickTimer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn tick_timer() -> (TickTimer<MockPlatform>, Arc<MockPlatform>) {
    let platform = MockPlatform::new();
    let timer = TickTimer::with_platform(Arc::clone(&platform)).unwrap();
    (timer, platform)
}

#[test]
fn test_arms_one_millisecond_periodic_timer() {
    let (timer, platform) = tick_timer();
    assert_eq!(timer.state(), TimerState::Idle);
    assert_eq!(timer.start(), Ok(true));
    assert_eq!(timer.start(), Ok(false));
    assert_eq!(
        platform.armed(platform.only_live()),
        Some(Armed {
            period_ms: 1,
            resolution_ms: 0,
            mode: TimerMode::Periodic,
        })
    );
    assert_eq!(timer.is_running(), Ok(true));
}

#[test]
fn test_rejects_platform_without_millisecond_period() {
    let platform = MockPlatform::with_caps(Ok(TimerCapabilities {
        min_period_ms: 5,
        max_period_ms: 100,
    }));
    assert!(matches!(
        TickTimer::with_platform(platform),
        Err(TimerError::OutOfRange { parameter: "period", .. })
    ));
}

#[test]
fn test_ticks_are_numbered_from_each_start() {
    let (timer, platform) = tick_timer();
    let log = EventLog::new();
    timer.subscribe(log.subscriber()).unwrap();

    timer.start().unwrap();
    platform.fire_all();
    platform.fire_all();
    timer.stop().unwrap();
    timer.start().unwrap();
    platform.fire_all();

    assert_eq!(
        log.entries(),
        vec!["started", "tick1", "tick2", "stopped", "started", "tick1"]
    );
}

#[test]
fn test_stale_firing_is_dropped() {
    let (timer, platform) = tick_timer();
    let log = EventLog::new();
    timer.subscribe(log.subscriber()).unwrap();
    timer.start().unwrap();
    let old = platform.only_live();
    timer.stop().unwrap();
    timer.start().unwrap();

    platform.fire(old);
    assert_eq!(log.count("tick1"), 0);
    platform.fire_all();
    assert_eq!(log.count("tick1"), 1);
}

#[test]
fn test_context_is_fixed_while_running() {
    let (timer, platform) = tick_timer();
    timer.set_event_context(Arc::new(7u32)).unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let from_tick = Arc::clone(&seen);
    timer
        .subscribe(move |event| {
            if let precision_tick::TimerEvent::Tick(tick) = event {
                if tick.context_as::<u32>() == Some(&7) {
                    from_tick.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
        .unwrap();

    timer.start().unwrap();
    assert_eq!(
        timer.set_event_context(Arc::new(8u32)),
        Err(TimerError::TimerRunning)
    );
    platform.fire_all();
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    timer.stop().unwrap();
    assert_eq!(timer.set_event_context(Arc::new(8u32)), Ok(()));
}

#[test]
fn test_dispose_semantics() {
    let (timer, platform) = tick_timer();
    let log = EventLog::new();
    timer.subscribe(log.subscriber()).unwrap();
    timer.start().unwrap();
    let id = platform.only_live();

    assert_eq!(timer.dispose(), Ok(()));
    assert_eq!(timer.state(), TimerState::Disposed);
    assert_eq!(platform.cancel_calls(id), 1);
    assert_eq!(log.entries(), vec!["started", "stopped"]);

    assert!(matches!(timer.dispose(), Err(TimerError::Disposed { .. })));
    assert!(matches!(timer.start(), Err(TimerError::Disposed { .. })));
    assert!(matches!(timer.stop(), Err(TimerError::Disposed { .. })));
    assert!(matches!(timer.is_running(), Err(TimerError::Disposed { .. })));
    assert!(matches!(timer.subscribe(|_| {}), Err(TimerError::Disposed { .. })));

    platform.fire(id);
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn test_drop_cancels_running_tick_timer() {
    let (timer, platform) = tick_timer();
    timer.start().unwrap();
    let id = platform.only_live();
    drop(timer);
    assert_eq!(platform.cancel_calls(id), 1);
    assert_eq!(platform.live_count(), 0);
}
