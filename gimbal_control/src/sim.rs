//! Host simulation platform.
//!
//! Stand-ins for the board collaborators so the full startup sequence runs on
//! a workstation: a heated IMU package with a first-order thermal model, a
//! fixed magnetic field, the heater controller, the CAN actuator bus and the
//! fault LED. All of them observe time through a shared [`ClockSource`], so
//! they run equally on the wall clock and on [`SimClock`](crate::clock::SimClock).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gimbal_common::config::{AxisReversal, HeadingConfig, ImuConfig, SimulationConfig};
use gimbal_common::drivers::{
    DriverError, FaultIndicator, HeadingSensor, PrimaryImu, TemperatureController,
};
use gimbal_common::flags::{ActuatorHealth, ErrorFlags, SharedActuatorHealth};
use gimbal_common::sensor::{CalibrationStatus, HeadingSample, ImuSample};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{ClockSource, Tick};
use crate::error::ControlError;
use crate::gate::calibration::ResumeHandle;
use crate::task::{TaskBuilder, TaskHandle};

const GRAVITY: f32 = 9.806_65;
const EARTH_FIELD_UT: [f32; 3] = [22.0, 0.0, 42.0];

pub type SharedClock = Arc<dyn ClockSource>;

// ─── Thermal model ──────────────────────────────────────────────────

/// Sensor-package temperature, integrated lazily on every read.
#[derive(Debug)]
pub struct ThermalModel {
    temperature: f32,
    setpoint: f32,
    heating_rate: f32,
    passive_rate: f32,
    heater_armed: bool,
    last: Tick,
}

impl ThermalModel {
    pub fn new(config: &SimulationConfig, now: Tick) -> Self {
        Self {
            temperature: config.ambient_c,
            setpoint: config.setpoint_c,
            heating_rate: config.heating_rate_c_per_s,
            passive_rate: config.passive_heating_c_per_s,
            heater_armed: false,
            last: now,
        }
    }

    /// Advance the model to `now` and return the temperature [°C].
    pub fn step(&mut self, now: Tick) -> f32 {
        let dt = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = self.last.max(now);

        let rate = if self.heater_armed {
            self.heating_rate
        } else {
            self.passive_rate
        };
        if self.temperature < self.setpoint {
            self.temperature = (self.temperature + rate * dt).min(self.setpoint);
        }
        self.temperature
    }

    pub fn arm_heater(&mut self) {
        self.heater_armed = true;
    }

    #[inline]
    pub fn heater_armed(&self) -> bool {
        self.heater_armed
    }
}

// ─── Sensors ────────────────────────────────────────────────────────

/// Heated accelerometer/gyroscope package at rest.
pub struct SimImu {
    clock: SharedClock,
    thermal: Arc<Mutex<ThermalModel>>,
    reversal: AxisReversal,
    uncalibrated_samples: u32,
    initialized: bool,
}

impl SimImu {
    pub fn new(clock: SharedClock, thermal: Arc<Mutex<ThermalModel>>, calibration_samples: u32) -> Self {
        Self {
            clock,
            thermal,
            reversal: AxisReversal::None,
            uncalibrated_samples: calibration_samples,
            initialized: false,
        }
    }
}

impl PrimaryImu for SimImu {
    fn initialize(&mut self, config: &ImuConfig) -> Result<(), DriverError> {
        self.reversal = config.axis_reversal;
        self.initialized = true;
        debug!(?config, "sim IMU configured");
        Ok(())
    }

    fn sample(&mut self) -> Result<ImuSample, DriverError> {
        if !self.initialized {
            return Err(DriverError::NoResponse { device: "sim-imu" });
        }
        let temperature = self.thermal.lock().step(self.clock.now());

        let calibration = if self.uncalibrated_samples > 0 {
            self.uncalibrated_samples -= 1;
            CalibrationStatus {
                accelerometer: false,
                gyroscope: true,
            }
        } else {
            CalibrationStatus::CALIBRATED
        };

        Ok(ImuSample {
            accel: self.reversal.apply([0.0, 0.0, GRAVITY]),
            gyro: [0.0; 3],
            temperature,
            calibration,
            ..Default::default()
        })
    }
}

/// Magnetometer seeing a constant field.
#[derive(Debug, Default)]
pub struct SimHeading {
    reversal: AxisReversal,
    initialized: bool,
}

impl HeadingSensor for SimHeading {
    fn initialize(&mut self, config: &HeadingConfig) -> Result<(), DriverError> {
        self.reversal = config.axis_reversal;
        self.initialized = true;
        debug!(address = config.address, rate_hz = config.rate_hz, "sim heading configured");
        Ok(())
    }

    fn refresh(&mut self) -> Result<HeadingSample, DriverError> {
        if !self.initialized {
            return Err(DriverError::NoResponse { device: "sim-heading" });
        }
        Ok(HeadingSample {
            field: self.reversal.apply(EARTH_FIELD_UT),
        })
    }
}

/// Heater controller acting on the shared thermal model.
pub struct SimHeater {
    thermal: Arc<Mutex<ThermalModel>>,
}

impl SimHeater {
    pub fn new(thermal: Arc<Mutex<ThermalModel>>) -> Self {
        Self { thermal }
    }
}

impl TemperatureController for SimHeater {
    fn initialize(&mut self) -> Result<(), DriverError> {
        self.thermal.lock().arm_heater();
        Ok(())
    }
}

// ─── Fault LED ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SimLed {
    lit: AtomicBool,
}

impl SimLed {
    #[inline]
    pub fn is_lit(&self) -> bool {
        self.lit.load(Ordering::Acquire)
    }
}

impl FaultIndicator for SimLed {
    fn assert_fault(&self) {
        self.lit.store(true, Ordering::Release);
        warn!("fault LED on");
    }
}

// ─── Actuator bus ───────────────────────────────────────────────────

/// Publishes actuator feedback into a [`SharedActuatorHealth`] on a schedule.
pub struct SimActuatorBus {
    health: Arc<SharedActuatorHealth>,
    online_after: Duration,
    power_failure_after: Option<Duration>,
}

impl SimActuatorBus {
    pub fn new(health: Arc<SharedActuatorHealth>, config: &SimulationConfig) -> Self {
        Self {
            health,
            online_after: Duration::from_millis(config.actuator_online_after_ms),
            power_failure_after: (config.power_failure_after_ms > 0)
                .then(|| Duration::from_millis(config.power_failure_after_ms)),
        }
    }

    /// Start the feedback task.
    pub fn spawn(self, clock: SharedClock) -> Result<TaskHandle<()>, ControlError> {
        TaskBuilder::new("sim-can").spawn(move || {
            let start = clock.now();
            clock.sleep_until(start + self.online_after);
            self.health.set(ActuatorHealth::FEEDBACK_UPDATED);
            info!("sim actuators online");

            if let Some(after) = self.power_failure_after {
                clock.sleep_until(start + after);
                self.health.set(ActuatorHealth::POWER_FAILURE_MASK);
                warn!("sim 24 V rail dropped");
            }
        })
    }
}

// ─── Calibration routine ────────────────────────────────────────────

/// Resumes the attitude loop every time it parks on the calibration gate.
///
/// Stands in for the operator command that acknowledges a finished
/// calibration. Runs for the process lifetime.
pub fn spawn_calibration_routine(
    handle: ResumeHandle,
    clock: SharedClock,
    settle: Duration,
) -> Result<TaskHandle<()>, ControlError> {
    TaskBuilder::new("sim-calibration").spawn(move || {
        let mut resumes = 0u64;
        loop {
            if handle.wait_for_suspension(Duration::from_secs(1)) {
                clock.sleep_for(settle);
                if handle.resume() {
                    resumes += 1;
                    debug!(resumes, "calibration step acknowledged");
                }
            }
        }
    })
}

// ─── Later init ─────────────────────────────────────────────────────

/// Simulated later-init stage run by the supervisor once the actuators
/// report feedback.
///
/// No actuator or display driver is brought up here; the stage only checks
/// that the attitude task is still alive and logs the current error set.
pub fn later_init<T>(attitude_task: &TaskHandle<T>, errors: &ErrorFlags) -> Result<(), ControlError> {
    if attitude_task.is_finished() {
        return Err(ControlError::TaskTerminated(attitude_task.name().to_owned()));
    }
    info!(errors = ?errors.snapshot(), "later init (simulated): actuators and display");
    Ok(())
}

// ─── Platform ───────────────────────────────────────────────────────

/// All simulated collaborators, wired to one clock and thermal model.
pub struct SimPlatform {
    pub imu: SimImu,
    pub heading: SimHeading,
    pub heater: SimHeater,
    pub led: Arc<SimLed>,
    pub health: Arc<SharedActuatorHealth>,
    pub bus: SimActuatorBus,
    pub thermal: Arc<Mutex<ThermalModel>>,
}

impl SimPlatform {
    pub fn new(clock: SharedClock, config: &SimulationConfig) -> Self {
        let thermal = Arc::new(Mutex::new(ThermalModel::new(config, clock.now())));
        let health = Arc::new(SharedActuatorHealth::new());
        Self {
            imu: SimImu::new(Arc::clone(&clock), Arc::clone(&thermal), config.calibration_samples),
            heading: SimHeading::default(),
            heater: SimHeater::new(Arc::clone(&thermal)),
            led: Arc::new(SimLed::default()),
            bus: SimActuatorBus::new(Arc::clone(&health), config),
            health,
            thermal,
        }
    }
}
