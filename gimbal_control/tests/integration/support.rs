//! Test doubles shared by the integration tests.

use std::collections::VecDeque;
use std::sync::Arc;

use gimbal_common::config::{HeadingConfig, ImuConfig};
use gimbal_common::drivers::{
    DriverError, FaultIndicator, FusionEngine, HeadingSensor, PrimaryImu, TemperatureController,
};
use gimbal_common::sensor::{CalibrationStatus, HeadingSample, ImuSample, SensorState};
use gimbal_control::clock::{ClockSource, SimClock, Tick};
use gimbal_control::safety::reset::{PriorityGroup, ResetFacility};
use parking_lot::Mutex;

// ── Sensors ─────────────────────────────────────────────────────────

/// IMU replaying a temperature script, then holding the last value.
///
/// Records the virtual time of every sample it hands out.
pub struct ScriptedImu {
    clock: Arc<SimClock>,
    temps: VecDeque<f32>,
    hold: f32,
    uncalibrated_at: Option<u32>,
    samples: u32,
    pub log: Arc<Mutex<Vec<Tick>>>,
}

impl ScriptedImu {
    pub fn new(clock: Arc<SimClock>, temps: &[f32]) -> Self {
        Self {
            clock,
            hold: temps.last().copied().unwrap_or(0.0),
            temps: temps.iter().copied().collect(),
            uncalibrated_at: None,
            samples: 0,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report the accelerometer uncalibrated on the `n`-th sample (1-based).
    pub fn uncalibrated_at(mut self, n: u32) -> Self {
        self.uncalibrated_at = Some(n);
        self
    }
}

impl PrimaryImu for ScriptedImu {
    fn initialize(&mut self, _: &ImuConfig) -> Result<(), DriverError> {
        Ok(())
    }

    fn sample(&mut self) -> Result<ImuSample, DriverError> {
        self.samples += 1;
        self.log.lock().push(self.clock.now());
        let temperature = self.temps.pop_front().unwrap_or(self.hold);
        let calibration = if self.uncalibrated_at == Some(self.samples) {
            CalibrationStatus {
                accelerometer: false,
                gyroscope: true,
            }
        } else {
            CalibrationStatus::CALIBRATED
        };
        Ok(ImuSample {
            accel: [0.0, 0.0, 9.81],
            temperature,
            calibration,
            ..Default::default()
        })
    }
}

#[derive(Default)]
pub struct StaticHeading;

impl HeadingSensor for StaticHeading {
    fn initialize(&mut self, _: &HeadingConfig) -> Result<(), DriverError> {
        Ok(())
    }

    fn refresh(&mut self) -> Result<HeadingSample, DriverError> {
        Ok(HeadingSample {
            field: [20.0, 0.0, 40.0],
        })
    }
}

/// Counts fusion updates through a shared counter.
#[derive(Default, Clone)]
pub struct CountingFusion(pub Arc<Mutex<u32>>);

impl FusionEngine for CountingFusion {
    fn update(&mut self, _: &ImuSample, _: &HeadingSample, _: &mut SensorState) {
        *self.0.lock() += 1;
    }
}

#[derive(Default)]
pub struct CountingHeater {
    pub armed: u32,
}

impl TemperatureController for CountingHeater {
    fn initialize(&mut self) -> Result<(), DriverError> {
        self.armed += 1;
        Ok(())
    }
}

// ── Fail-safe path ──────────────────────────────────────────────────

/// Ordered record of what the fail-safe path touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Led,
    Reset(u32),
}

#[derive(Default, Clone)]
pub struct EventLog(pub Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }
}

pub struct RecordingLed(pub EventLog);

impl FaultIndicator for RecordingLed {
    fn assert_fault(&self) {
        self.0.0.lock().push(Event::Led);
    }
}

/// Reset primitive that records the request and unwinds instead of
/// resetting, so the harness regains control.
pub struct InterceptedReset {
    pub group: PriorityGroup,
    pub log: EventLog,
}

/// Unwind payload thrown by [`InterceptedReset`].
pub struct ResetIntercepted;

impl ResetFacility for InterceptedReset {
    fn priority_group(&self) -> PriorityGroup {
        self.group
    }

    fn request_system_reset(&self, aircr: u32) {
        self.log.0.lock().push(Event::Reset(aircr));
        std::panic::resume_unwind(Box::new(ResetIntercepted));
    }
}
