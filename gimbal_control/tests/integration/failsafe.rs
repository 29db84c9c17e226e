//! Integration test: supervisory fail-safe.
//!
//! 1. A single disconnected axis never trips the reset.
//! 2. Pitch and yaw disconnected together assert the fault LED, then request
//!    exactly one system reset whose AIRCR image keeps the priority grouping.
//! 3. Nothing after the reset request executes.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use gimbal_common::config::MonitorConfig;
use gimbal_common::drivers::ActuatorHealthSource;
use gimbal_common::flags::{ActuatorHealth, SharedActuatorHealth};
use gimbal_control::clock::{ClockSource, SimClock, Tick};
use gimbal_control::safety::monitor::{MonitorVerdict, SupervisoryMonitor};
use gimbal_control::safety::reset::{AIRCR_PRIGROUP_MASK, PriorityGroup};

use super::support::{Event, EventLog, InterceptedReset, RecordingLed, ResetIntercepted};

// ── Helpers ─────────────────────────────────────────────────────────

const PRIGROUP_BITS: u32 = 0x0000_0500;

type Monitor<H> = SupervisoryMonitor<H, RecordingLed, InterceptedReset, Arc<SimClock>>;

fn monitor<H: ActuatorHealthSource>(health: H, clock: Arc<SimClock>) -> (Monitor<H>, EventLog) {
    let log = EventLog::default();
    let monitor = SupervisoryMonitor::new(
        health,
        RecordingLed(log.clone()),
        InterceptedReset {
            group: PriorityGroup::from_aircr(0xFA05_0000 | PRIGROUP_BITS),
            log: log.clone(),
        },
        clock,
        &MonitorConfig::default(),
    );
    (monitor, log)
}

/// Health source whose rail drops at a fixed virtual time.
struct RailDropsAt {
    clock: Arc<SimClock>,
    at: Tick,
}

impl ActuatorHealthSource for RailDropsAt {
    fn snapshot(&self) -> ActuatorHealth {
        if self.clock.now() >= self.at {
            ActuatorHealth::FEEDBACK_UPDATED | ActuatorHealth::POWER_FAILURE_MASK
        } else {
            ActuatorHealth::FEEDBACK_UPDATED
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn pitch_only_disconnect_does_not_reset() {
    let health = Arc::new(SharedActuatorHealth::new());
    health.publish(ActuatorHealth::FEEDBACK_UPDATED | ActuatorHealth::PITCH_NOT_CONNECTED);
    let (monitor, log) = monitor(Arc::clone(&health), Arc::new(SimClock::new()));

    assert!(!monitor.is_fail_safe_triggered());
    assert_eq!(
        monitor.poll_once(),
        MonitorVerdict::AxisLost(ActuatorHealth::PITCH_NOT_CONNECTED)
    );
    assert!(log.events().is_empty());

    health.publish(ActuatorHealth::FEEDBACK_UPDATED | ActuatorHealth::YAW_NOT_CONNECTED);
    assert!(!monitor.is_fail_safe_triggered());
    health.publish(ActuatorHealth::FEEDBACK_UPDATED);
    assert_eq!(monitor.poll_once(), MonitorVerdict::Healthy);
    assert!(log.events().is_empty());
}

#[test]
fn both_axes_disconnected_resets_once_preserving_prigroup() {
    let health = Arc::new(SharedActuatorHealth::new());
    health.publish(ActuatorHealth::PITCH_NOT_CONNECTED | ActuatorHealth::YAW_NOT_CONNECTED);
    let (monitor, log) = monitor(Arc::clone(&health), Arc::new(SimClock::new()));

    assert!(monitor.is_fail_safe_triggered());

    let mut after_reset = false;
    let result = catch_unwind(AssertUnwindSafe(|| {
        monitor.poll_once();
        after_reset = true;
    }));

    let payload = result.expect_err("fail-safe must not return");
    assert!(payload.is::<ResetIntercepted>());
    assert!(!after_reset);

    let events = log.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], Event::Led);
    let Event::Reset(aircr) = events[1] else {
        panic!("expected reset request, got {:?}", events[1]);
    };
    assert_eq!(aircr & AIRCR_PRIGROUP_MASK, PRIGROUP_BITS);
    assert_eq!(aircr, 0x05FA_0504);
}

#[test]
fn monitor_loop_trips_on_first_poll_after_rail_drops() {
    let clock = Arc::new(SimClock::new());
    let health = RailDropsAt {
        clock: Arc::clone(&clock),
        at: Tick::ZERO + Duration::from_millis(900),
    };
    let (monitor, log) = monitor(health, Arc::clone(&clock));

    assert!(monitor.check_startup_ready());
    let result = catch_unwind(AssertUnwindSafe(|| {
        monitor.run();
    }));

    assert!(result.is_err());
    // Polled at 0, 200, ..., 800 ms healthy; tripped at 1000 ms.
    assert_eq!(clock.now(), Tick::ZERO + Duration::from_millis(1000));
    assert_eq!(
        log.events().iter().filter(|e| matches!(e, Event::Reset(_))).count(),
        1
    );
}
