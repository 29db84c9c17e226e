//! Integration test: deadline cadence and overrun recovery.
//!
//! 1. Without overruns the n-th wake is at `t0 + n·P`.
//! 2. A body longer than P re-anchors the next wake to the clock at the end
//!    of that body and raises `FRAME_OVERRUN`.

use std::sync::Arc;
use std::time::Duration;

use gimbal_common::flags::{ErrorFlags, ErrorKind};
use gimbal_common::sensor::{Lifecycle, SensorState};
use gimbal_control::attitude::AttitudeLoop;
use gimbal_control::clock::{ClockSource, SimClock, Tick};
use gimbal_control::cycle::{CycleControl, DeadlineScheduler, WakeKind};
use gimbal_control::gate::calibration::CalibrationGate;
use gimbal_control::gate::thermal::ThermalGate;
use proptest::prelude::*;

use super::support::{CountingFusion, CountingHeater, ScriptedImu, StaticHeading};

// ── Properties ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn wakes_are_exactly_periodic(
        period_us in 100u64..=20_000,
        start_ns in 0u64..1_000_000_000,
        cycles in 1usize..300,
    ) {
        let period = Duration::from_micros(period_us);
        let t0 = Tick::from_nanos(start_ns);
        let clock = SimClock::starting_at(t0);
        let errors = Arc::new(ErrorFlags::new());
        let mut sched = DeadlineScheduler::new(&clock, period, Arc::clone(&errors));

        let mut deadlines = Vec::with_capacity(cycles);
        sched.run(|wake| {
            deadlines.push(wake.deadline);
            if deadlines.len() == cycles {
                CycleControl::Break(())
            } else {
                CycleControl::Continue
            }
        });

        for (i, deadline) in deadlines.iter().enumerate() {
            prop_assert_eq!(*deadline, t0 + period * (i as u32 + 1));
        }
        prop_assert!(errors.snapshot().is_empty());
        prop_assert_eq!(sched.stats().overruns, 0);
    }

    #[test]
    fn overrun_at_any_index_reanchors_to_now(
        period_us in 100u64..=10_000,
        cycles in 2usize..100,
        overrun_at in 0usize..99,
        extra in 0.0f64..3.0,
    ) {
        let overrun_at = overrun_at % (cycles - 1);
        let period = Duration::from_micros(period_us);
        let delay = period + period.mul_f64(extra);
        let clock = SimClock::new();
        let errors = Arc::new(ErrorFlags::new());
        let mut sched = DeadlineScheduler::new(&clock, period, Arc::clone(&errors));

        let mut wakes = Vec::with_capacity(cycles);
        let mut end_of_overrun = Tick::ZERO;
        sched.run(|wake| {
            let index = wakes.len();
            wakes.push(*wake);
            if index == overrun_at {
                clock.advance(delay);
                end_of_overrun = clock.now();
            }
            if wakes.len() == cycles {
                CycleControl::Break(())
            } else {
                CycleControl::Continue
            }
        });

        for (i, wake) in wakes.iter().enumerate().take(overrun_at + 1) {
            prop_assert_eq!(wake.kind, WakeKind::OnTime);
            prop_assert_eq!(wake.deadline, Tick::ZERO + period * (i as u32 + 1));
        }
        let next = wakes[overrun_at + 1];
        prop_assert_eq!(next.kind, WakeKind::Overrun);
        prop_assert_eq!(next.deadline, end_of_overrun);
        for (k, wake) in wakes.iter().enumerate().skip(overrun_at + 2) {
            let after = (k - overrun_at - 1) as u32;
            prop_assert_eq!(wake.deadline, end_of_overrun + period * after);
        }
        prop_assert!(errors.contains(ErrorKind::FRAME_OVERRUN));
        prop_assert_eq!(sched.stats().overruns, 1);
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[test]
fn thousand_on_time_cycles_after_warmup() {
    let clock = Arc::new(SimClock::new());
    let imu = ScriptedImu::new(Arc::clone(&clock), &[35.0, 48.0, 57.5, 60.9, 61.2, 62.0]);
    let log = Arc::clone(&imu.log);
    let fusion = CountingFusion::default();
    let fused = Arc::clone(&fusion.0);
    let mut lp = AttitudeLoop::new(imu, StaticHeading, fusion, Arc::new(CalibrationGate::new()));
    let mut heater = CountingHeater::default();
    let mut state = SensorState::new();

    let outcome = lp.warm_up(&ThermalGate::default(), &*clock, &mut heater, &mut state);
    assert!(outcome.controller_armed);
    assert_eq!(outcome.final_temperature, 61.2);
    assert_eq!(state.lifecycle(), Lifecycle::Ready);
    assert_eq!(heater.armed, 1);

    let period = Duration::from_millis(1);
    let t0 = clock.now();
    let mut sched = DeadlineScheduler::new(Arc::clone(&clock), period, state.error_flags());
    lp.run_for(&mut sched, &mut state, 1000);

    assert!(!state.errors().contains(ErrorKind::FRAME_OVERRUN));
    assert!(state.errors().is_empty());
    assert_eq!(state.lifecycle(), Lifecycle::Ready);
    assert!(!state.mark_ready());
    assert_eq!(*fused.lock(), 1000);
    assert_eq!(clock.now(), t0 + period * 1000);

    let log = log.lock();
    let cycle_times = &log[log.len() - 1000..];
    for (n, t) in cycle_times.iter().enumerate() {
        assert_eq!(*t, t0 + period * (n as u32 + 1));
    }
}

#[test]
fn long_body_on_cycle_ten_reanchors() {
    let clock = SimClock::new();
    let period = Duration::from_millis(1);
    let errors = Arc::new(ErrorFlags::new());
    let mut sched = DeadlineScheduler::new(&clock, period, Arc::clone(&errors));

    let mut cycle = 0u32;
    let mut end_of_ten = None;
    let mut flagged_after_ten = false;
    let next = sched.run(|wake| {
        cycle += 1;
        if cycle == 10 {
            assert!(errors.snapshot().is_empty());
            clock.advance(period * 3 / 2);
            end_of_ten = Some(clock.now());
        }
        if cycle == 11 {
            flagged_after_ten = errors.contains(ErrorKind::FRAME_OVERRUN);
            return CycleControl::Break(*wake);
        }
        CycleControl::Continue
    });

    assert!(flagged_after_ten);
    assert_eq!(next.kind, WakeKind::Overrun);
    assert_eq!(Some(next.deadline), end_of_ten);
    assert_eq!(next.deadline, Tick::from_nanos(11_500_000));
}
