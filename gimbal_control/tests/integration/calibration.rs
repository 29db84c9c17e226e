//! Integration test: calibration suspend and resume.
//!
//! Calibration reported incomplete on cycle 5 parks the attitude loop after
//! that cycle's fusion step. While parked no sample or fusion runs. A resume
//! at virtual time T makes cycle 6 run at T and cycle 7 at T + P: no missed
//! deadlines are replayed and no overrun is reported.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gimbal_common::flags::ErrorKind;
use gimbal_common::sensor::SensorState;
use gimbal_control::attitude::AttitudeLoop;
use gimbal_control::clock::{SimClock, Tick};
use gimbal_control::cycle::DeadlineScheduler;
use gimbal_control::gate::calibration::{CalibrationGate, GateState};

use super::support::{CountingFusion, ScriptedImu, StaticHeading};

const P: Duration = Duration::from_millis(1);
const WAIT: Duration = Duration::from_secs(5);

#[test]
fn suspend_after_cycle_five_resumes_at_resume_time() {
    let clock = Arc::new(SimClock::new());
    let imu = ScriptedImu::new(Arc::clone(&clock), &[62.0]).uncalibrated_at(5);
    let samples = Arc::clone(&imu.log);
    let fusion = CountingFusion::default();
    let fused = Arc::clone(&fusion.0);
    let gate = Arc::new(CalibrationGate::new());
    let handle = gate.resume_handle();

    let worker = {
        let clock = Arc::clone(&clock);
        thread::spawn(move || {
            let mut state = SensorState::new();
            state.temperature = 62.0;
            let mut lp = AttitudeLoop::new(imu, StaticHeading, fusion, gate);
            let mut sched = DeadlineScheduler::new(clock, P, state.error_flags());
            lp.run_for(&mut sched, &mut state, 7);
            (state.errors(), sched.stats().resyncs, lp.counters().suspensions)
        })
    };

    assert!(handle.wait_for_suspension(WAIT));
    assert_eq!(samples.lock().len(), 5);
    assert_eq!(*fused.lock(), 5);

    // Time passes while parked; nothing runs.
    let t = Tick::ZERO + Duration::from_millis(250);
    clock.advance_to(t);
    thread::sleep(Duration::from_millis(20));
    assert!(handle.is_suspended());
    assert_eq!(samples.lock().len(), 5);
    assert_eq!(*fused.lock(), 5);

    assert!(handle.resume());
    let (errors, resyncs, suspensions) = worker.join().unwrap();

    let samples = samples.lock().clone();
    let expected: Vec<Tick> = (1..=5u32)
        .map(|n| Tick::ZERO + P * n)
        .chain([t, t + P])
        .collect();
    assert_eq!(samples, expected);
    assert!(!errors.contains(ErrorKind::FRAME_OVERRUN));
    assert_eq!(resyncs, 1);
    assert_eq!(suspensions, 1);
    assert_eq!(*fused.lock(), 7);
}

#[test]
fn resume_racing_the_check_is_not_lost() {
    let gate = Arc::new(CalibrationGate::new());
    for _ in 0..200 {
        let ticket = gate.ticket();
        let resumer = {
            let handle = gate.resume_handle();
            thread::spawn(move || handle.resume())
        };
        // Either the resume lands before the suspend registers (no block) or
        // after (wakes the waiter); it must never be lost.
        gate.suspend(ticket);
        resumer.join().unwrap();
        assert_eq!(gate.state(), GateState::Open);
    }
}
