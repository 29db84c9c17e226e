//! Collaborator contracts.
//!
//! The control core never touches registers or buses directly. Every device it
//! orchestrates is reached through one of these traits so that the board
//! drivers, the host simulation and test doubles are interchangeable.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{HeadingConfig, ImuConfig};
use crate::flags::{ActuatorHealth, SharedActuatorHealth};
use crate::sensor::{HeadingSample, ImuSample, SensorState};

/// Error reported by a device collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// Device did not answer (bus timeout, NACK, missing WHO_AM_I).
    #[error("{device}: no response")]
    NoResponse { device: &'static str },

    /// Device answered with data that failed validation.
    #[error("{device}: invalid data: {reason}")]
    InvalidData {
        device: &'static str,
        reason: String,
    },

    /// Device rejected its configuration.
    #[error("{device}: configuration rejected: {reason}")]
    Config {
        device: &'static str,
        reason: String,
    },
}

/// Primary motion sensor (accelerometer + gyroscope + die temperature).
pub trait PrimaryImu {
    fn initialize(&mut self, config: &ImuConfig) -> Result<(), DriverError>;

    /// Read one fresh sample.
    fn sample(&mut self) -> Result<ImuSample, DriverError>;
}

/// Secondary heading sensor (magnetometer).
pub trait HeadingSensor {
    fn initialize(&mut self, config: &HeadingConfig) -> Result<(), DriverError>;

    /// Refresh and return the latest field reading.
    fn refresh(&mut self) -> Result<HeadingSample, DriverError>;
}

/// Closed-loop heater keeping the IMU package at its operating temperature.
pub trait TemperatureController {
    /// Arm the controller. Only called after a physically valid reading.
    fn initialize(&mut self) -> Result<(), DriverError>;
}

/// Attitude estimation algorithm.
///
/// Consumes both samples, writes `state.attitude`, and may update
/// `state.calibration` while it estimates sensor biases.
pub trait FusionEngine {
    /// Called once after warm-up, before the first `update`.
    fn reset(&mut self, _state: &SensorState) {}

    fn update(&mut self, imu: &ImuSample, heading: &HeadingSample, state: &mut SensorState);
}

/// Read-only view of the actuator/power health published by the CAN driver.
pub trait ActuatorHealthSource {
    /// One consistent snapshot of all health bits.
    fn snapshot(&self) -> ActuatorHealth;
}

impl ActuatorHealthSource for SharedActuatorHealth {
    #[inline]
    fn snapshot(&self) -> ActuatorHealth {
        self.load()
    }
}

impl<T: ActuatorHealthSource + ?Sized> ActuatorHealthSource for Arc<T> {
    #[inline]
    fn snapshot(&self) -> ActuatorHealth {
        (**self).snapshot()
    }
}

/// Visible fault signal (yellow status LED on the board).
pub trait FaultIndicator {
    fn assert_fault(&self);
}

impl<T: FaultIndicator + ?Sized> FaultIndicator for Arc<T> {
    fn assert_fault(&self) {
        (**self).assert_fault()
    }
}
