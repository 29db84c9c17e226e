//! Integration test: thermal warm-up gate.
//!
//! Validates the arming policy and the monotonic `Initializing → Ready`
//! transition:
//! 1. A valid initial reading arms the heater exactly once.
//! 2. An initial reading ≤ 0 leaves it disarmed, raises the sensor fault once,
//!    and the gate still opens once the package is warm.
//! 3. `Ready` is reached only on a sample at or above the threshold and never
//!    reverts.

use std::sync::Arc;
use std::time::Duration;

use gimbal_common::flags::ErrorKind;
use gimbal_common::sensor::{Lifecycle, SensorState};
use gimbal_control::attitude::AttitudeLoop;
use gimbal_control::clock::{ClockSource, SimClock, Tick};
use gimbal_control::cycle::DeadlineScheduler;
use gimbal_control::gate::calibration::CalibrationGate;
use gimbal_control::gate::thermal::ThermalGate;
use proptest::prelude::*;

use super::support::{CountingFusion, CountingHeater, ScriptedImu, StaticHeading};

const THRESHOLD: f32 = 61.0;

fn gate() -> ThermalGate {
    ThermalGate::new(THRESHOLD, Duration::from_millis(50))
}

#[test]
fn negative_initial_temperature_degrades_but_opens() {
    let clock = Arc::new(SimClock::new());
    let mut imu = ScriptedImu::new(Arc::clone(&clock), &[-5.0, 20.0, 45.0, 61.0]);
    let mut heater = CountingHeater::default();
    let mut state = SensorState::new();

    let outcome = gate().arm_and_wait_for_warmup(&*clock, &mut state, &mut imu, &mut heater);

    assert!(!outcome.controller_armed);
    assert!(outcome.degraded);
    assert_eq!(heater.armed, 0);
    assert_eq!(state.errors(), ErrorKind::TEMPERATURE_SENSOR_FAULT);
    assert_eq!(state.lifecycle(), Lifecycle::Ready);
    assert_eq!(outcome.final_temperature, 61.0);
    assert_eq!(clock.now(), Tick::ZERO + Duration::from_millis(150));
}

#[test]
fn sensor_fault_is_raised_once() {
    let clock = Arc::new(SimClock::new());
    let mut imu = ScriptedImu::new(Arc::clone(&clock), &[0.0, 62.0]);
    let mut heater = CountingHeater::default();
    let mut state = SensorState::new();
    let flags = state.error_flags();

    gate().arm_and_wait_for_warmup(&*clock, &mut state, &mut imu, &mut heater);

    // Already set: a second raise reports nothing new.
    assert!(flags.raise(ErrorKind::TEMPERATURE_SENSOR_FAULT).is_empty());
    assert_eq!(heater.armed, 0);
}

#[test]
fn ready_never_reverts_when_temperature_drops() {
    let clock = Arc::new(SimClock::new());
    let imu = ScriptedImu::new(Arc::clone(&clock), &[62.0, 50.0, 40.0, 30.0]);
    let mut lp = AttitudeLoop::new(
        imu,
        StaticHeading,
        CountingFusion::default(),
        Arc::new(CalibrationGate::new()),
    );
    let mut heater = CountingHeater::default();
    let mut state = SensorState::new();

    lp.warm_up(&gate(), &*clock, &mut heater, &mut state);
    assert!(state.is_ready());

    let mut sched = DeadlineScheduler::new(
        Arc::clone(&clock),
        Duration::from_millis(1),
        state.error_flags(),
    );
    lp.run_for(&mut sched, &mut state, 10);

    assert_eq!(state.lifecycle(), Lifecycle::Ready);
    assert_eq!(state.temperature, 30.0);
    assert!(state.errors().contains(ErrorKind::TEMPERATURE_WARNING));
}

proptest! {
    #[test]
    fn ready_only_after_sample_reaches_threshold(
        below in prop::collection::vec(0.5f32..60.99, 0..20),
        warm in 61.0f32..90.0,
    ) {
        let clock = Arc::new(SimClock::new());
        let mut script = below.clone();
        script.push(warm);
        let mut imu = ScriptedImu::new(Arc::clone(&clock), &script);
        let log = Arc::clone(&imu.log);
        let mut heater = CountingHeater::default();
        let mut state = SensorState::new();

        let outcome = gate().arm_and_wait_for_warmup(&*clock, &mut state, &mut imu, &mut heater);

        prop_assert!(state.is_ready());
        prop_assert_eq!(outcome.final_temperature, warm);
        prop_assert_eq!(outcome.samples as usize, script.len());
        prop_assert_eq!(log.lock().len(), script.len());
        prop_assert_eq!(heater.armed, 1);
        prop_assert!(!outcome.degraded);
        // One poll interval per sample below threshold.
        prop_assert_eq!(
            clock.now(),
            Tick::ZERO + Duration::from_millis(50) * below.len() as u32
        );
    }
}
