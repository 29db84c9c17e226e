//! Sensor state owned by the attitude loop, plus the sample types exchanged
//! with the sensor collaborators.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flags::{ErrorFlags, ErrorKind};

/// Attitude-loop lifecycle.
///
/// Monotonic: `Initializing → Ready` once, after thermal warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Lifecycle {
    /// Sensors armed, waiting for the warm-up gate.
    #[default]
    Initializing = 0,
    /// Warm-up complete, fusion running.
    Ready = 1,
}

/// Per-sensor bias/scale calibration completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub accelerometer: bool,
    pub gyroscope: bool,
}

impl CalibrationStatus {
    /// Both sensors calibrated.
    pub const CALIBRATED: Self = Self {
        accelerometer: true,
        gyroscope: true,
    };

    #[inline]
    pub const fn is_complete(&self) -> bool {
        self.accelerometer && self.gyroscope
    }
}

/// Fused orientation estimate [rad].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// One primary IMU reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    /// Specific force [m/s²], body frame.
    pub accel: [f32; 3],
    /// Angular rate [rad/s], body frame.
    pub gyro: [f32; 3],
    /// Sensor-package temperature [°C].
    pub temperature: f32,
    /// Calibration state reported by the driver.
    pub calibration: CalibrationStatus,
    /// Diagnostic flags the driver wants raised.
    pub errors: ErrorKind,
}

/// One heading (magnetometer) reading [µT], body frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadingSample {
    pub field: [f32; 3],
}

/// State of the attitude estimator.
///
/// Created once at startup and exclusively mutated by the attitude loop. The
/// error flags are the only part shared with other contexts, through
/// [`SensorState::error_flags`].
#[derive(Debug)]
pub struct SensorState {
    /// Last measured sensor-package temperature [°C].
    pub temperature: f32,
    /// Calibration flags, updated by the driver and the fusion engine.
    pub calibration: CalibrationStatus,
    /// Latest fused orientation.
    pub attitude: Attitude,
    errors: Arc<ErrorFlags>,
    lifecycle: Lifecycle,
}

impl SensorState {
    pub fn new() -> Self {
        Self::with_error_flags(Arc::new(ErrorFlags::new()))
    }

    /// Build a state that reports into an existing flag set.
    pub fn with_error_flags(errors: Arc<ErrorFlags>) -> Self {
        Self {
            temperature: 0.0,
            calibration: CalibrationStatus::default(),
            attitude: Attitude::default(),
            errors,
            lifecycle: Lifecycle::Initializing,
        }
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }

    /// Transition to `Ready`. Returns `true` only for the call that performed
    /// the transition.
    pub fn mark_ready(&mut self) -> bool {
        let first = self.lifecycle == Lifecycle::Initializing;
        self.lifecycle = Lifecycle::Ready;
        first
    }

    /// Raise diagnostic flags; returns the newly set ones.
    #[inline]
    pub fn raise(&self, kind: ErrorKind) -> ErrorKind {
        self.errors.raise(kind)
    }

    #[inline]
    pub fn errors(&self) -> ErrorKind {
        self.errors.snapshot()
    }

    /// Handle for diagnostic readers in other threads.
    pub fn error_flags(&self) -> Arc<ErrorFlags> {
        Arc::clone(&self.errors)
    }

    /// Copy a fresh IMU sample into the state.
    pub fn apply_sample(&mut self, sample: &ImuSample) {
        self.temperature = sample.temperature;
        self.calibration = sample.calibration;
        if !sample.errors.is_empty() {
            self.errors.raise(sample.errors);
        }
    }
}

impl Default for SensorState {
    fn default() -> Self {
        Self::new()
    }
}
