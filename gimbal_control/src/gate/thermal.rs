//! Thermal warm-up gate.
//!
//! The IMU bias is only stable once the heated sensor package reaches its
//! operating temperature, so fusion must not start before that. The gate:
//!
//! 1. Takes one sample. A physically valid temperature (> 0 °C) arms the
//!    heater; anything else (including a failed read) raises
//!    `TEMPERATURE_SENSOR_FAULT` and leaves it disarmed.
//! 2. Polls every `poll_interval` until a sample reaches the threshold.
//!    No timeout.
//! 3. Marks the sensor state `Ready`.
//!
//! A disarmed heater does not stop the gate from opening once the package is
//! warm; that outcome is reported as degraded.

use std::time::Duration;

use gimbal_common::config::ThermalConfig;
use gimbal_common::drivers::{PrimaryImu, TemperatureController};
use gimbal_common::flags::ErrorKind;
use gimbal_common::sensor::SensorState;
use tracing::{debug, info, warn};

use crate::clock::ClockSource;
use crate::poll::Poller;

/// Result of the warm-up gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmupOutcome {
    /// Heater was armed after a valid initial reading.
    pub controller_armed: bool,
    /// `Ready` was reached with `TEMPERATURE_SENSOR_FAULT` set.
    pub degraded: bool,
    /// Samples taken, initial one included.
    pub samples: u32,
    /// Temperature that released the gate [°C].
    pub final_temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalGate {
    threshold: f32,
    poll_interval: Duration,
}

impl ThermalGate {
    pub fn new(threshold: f32, poll_interval: Duration) -> Self {
        Self {
            threshold,
            poll_interval,
        }
    }

    pub fn from_config(config: &ThermalConfig) -> Self {
        Self::new(config.warmup_threshold_c, config.poll_interval())
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Arm the heater if possible and block until warm.
    pub fn arm_and_wait_for_warmup<C, I, T>(
        &self,
        clock: &C,
        state: &mut SensorState,
        imu: &mut I,
        controller: &mut T,
    ) -> WarmupOutcome
    where
        C: ClockSource + ?Sized,
        I: PrimaryImu + ?Sized,
        T: TemperatureController + ?Sized,
    {
        let mut samples = 1u32;
        let initial_valid = match imu.sample() {
            Ok(sample) => {
                state.apply_sample(&sample);
                sample.temperature > 0.0
            }
            Err(e) => {
                warn!("initial temperature read failed: {e}");
                false
            }
        };

        let controller_armed = if initial_valid {
            match controller.initialize() {
                Ok(()) => {
                    info!(temperature = state.temperature, "temperature controller armed");
                    true
                }
                Err(e) => {
                    warn!("temperature controller failed to arm: {e}");
                    false
                }
            }
        } else {
            state.raise(ErrorKind::TEMPERATURE_SENSOR_FAULT);
            warn!(
                temperature = state.temperature,
                "invalid initial temperature, controller left disarmed"
            );
            false
        };

        let threshold = self.threshold;
        Poller::new(clock, self.poll_interval).until(|| {
            if state.temperature >= threshold {
                return true;
            }
            match imu.sample() {
                Ok(sample) => {
                    samples += 1;
                    state.apply_sample(&sample);
                    debug!(temperature = sample.temperature, threshold, "warming up");
                }
                Err(e) => warn!("temperature poll failed: {e}"),
            }
            false
        });

        state.mark_ready();
        let degraded = state.errors().contains(ErrorKind::TEMPERATURE_SENSOR_FAULT);
        if degraded {
            warn!(
                temperature = state.temperature,
                "warm-up complete without temperature control (degraded)"
            );
        } else {
            info!(temperature = state.temperature, samples, "warm-up complete");
        }

        WarmupOutcome {
            controller_armed,
            degraded,
            samples,
            final_temperature: state.temperature,
        }
    }
}

impl Default for ThermalGate {
    fn default() -> Self {
        Self::from_config(&ThermalConfig::default())
    }
}
