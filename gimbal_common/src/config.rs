//! Configuration loading traits and types.
//!
//! One TOML file configures the whole control core. Every numeric field has a
//! `#[serde(default)]` so that an empty section reproduces the board firmware,
//! and [`GimbalConfig::validate`] checks bounds from [`crate::consts`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use gimbal_common::config::{ConfigLoader, ConfigError, GimbalConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = GimbalConfig::load(Path::new("config/gimbal.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::*;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common fields shared by every gimbal binary.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "gimbal-sim-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "gimbal".to_string(),
        }
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Any serde-deserializable struct gets `load`.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Sensor Driver Config ───────────────────────────────────────────

/// Accelerometer full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccelScale {
    #[serde(rename = "2g")]
    G2,
    #[serde(rename = "4g")]
    G4,
    #[default]
    #[serde(rename = "8g")]
    G8,
    #[serde(rename = "16g")]
    G16,
}

impl AccelScale {
    /// Full-scale value [g].
    pub const fn full_scale_g(&self) -> f32 {
        match self {
            Self::G2 => 2.0,
            Self::G4 => 4.0,
            Self::G8 => 8.0,
            Self::G16 => 16.0,
        }
    }
}

/// Gyroscope full-scale range [°/s].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GyroScale {
    #[serde(rename = "250dps")]
    Dps250,
    #[serde(rename = "500dps")]
    Dps500,
    #[default]
    #[serde(rename = "1000dps")]
    Dps1000,
    #[serde(rename = "2000dps")]
    Dps2000,
}

impl GyroScale {
    pub const fn full_scale_dps(&self) -> f32 {
        match self {
            Self::Dps250 => 250.0,
            Self::Dps500 => 500.0,
            Self::Dps1000 => 1000.0,
            Self::Dps2000 => 2000.0,
        }
    }
}

/// Mounting correction: which body axis is reversed relative to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AxisReversal {
    #[default]
    None,
    X,
    Y,
    Z,
}

impl AxisReversal {
    /// Apply the reversal to a body-frame vector.
    pub fn apply(&self, mut v: [f32; 3]) -> [f32; 3] {
        match self {
            Self::None => {}
            Self::X => v[0] = -v[0],
            Self::Y => v[1] = -v[1],
            Self::Z => v[2] = -v[2],
        }
        v
    }
}

/// Primary IMU driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    pub accel_scale: AccelScale,
    pub gyro_scale: GyroScale,
    pub axis_reversal: AxisReversal,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            accel_scale: AccelScale::G8,
            gyro_scale: GyroScale::Dps1000,
            axis_reversal: AxisReversal::X,
        }
    }
}

/// Heading sensor driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// 7-bit I2C address.
    pub address: u8,
    /// Output rate [Hz].
    pub rate_hz: u16,
    pub axis_reversal: AxisReversal,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            address: HEADING_ADDR_FLOATING,
            rate_hz: HEADING_RATE_HZ,
            axis_reversal: AxisReversal::None,
        }
    }
}

// ─── Core Loop Config ───────────────────────────────────────────────

/// Attitude task timing and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttitudeConfig {
    /// Update rate [Hz]; the scheduler period is its reciprocal.
    pub update_hz: u32,
    /// Task stack size [bytes].
    pub stack_size: usize,
    /// Priority above normal.
    pub priority_offset: u8,
    /// Lower edge of the safe temperature band [°C].
    pub warning_low_c: f32,
    /// Upper edge of the safe temperature band [°C].
    pub warning_high_c: f32,
}

impl Default for AttitudeConfig {
    fn default() -> Self {
        Self {
            update_hz: ATTITUDE_UPDATE_HZ,
            stack_size: ATTITUDE_STACK_SIZE,
            priority_offset: ATTITUDE_PRIORITY_OFFSET,
            warning_low_c: TEMP_WARNING_LOW_C,
            warning_high_c: TEMP_WARNING_HIGH_C,
        }
    }
}

impl AttitudeConfig {
    /// Fixed scheduler period.
    pub fn period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.update_hz.max(1) as u64)
    }
}

/// Thermal warm-up gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    /// Temperature that releases the gate [°C].
    pub warmup_threshold_c: f32,
    /// Polling interval while warming up [ms].
    pub poll_interval_ms: u64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            warmup_threshold_c: WARMUP_THRESHOLD_C,
            poll_interval_ms: WARMUP_POLL_MS,
        }
    }
}

impl ThermalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Supervisory monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Fail-safe evaluation interval [ms].
    pub poll_interval_ms: u64,
    /// Startup liveness polling interval [ms].
    pub startup_poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: MONITOR_POLL_MS,
            startup_poll_interval_ms: STARTUP_POLL_MS,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.startup_poll_interval_ms)
    }
}

/// Host simulation parameters (only read by the simulated platform).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Initial sensor-package temperature [°C].
    pub ambient_c: f32,
    /// Heating rate while the heater is armed [°C/s].
    pub heating_rate_c_per_s: f32,
    /// Heating rate from board self-heating alone [°C/s].
    pub passive_heating_c_per_s: f32,
    /// Heater set point [°C].
    pub setpoint_c: f32,
    /// Number of samples until the simulated IMU reports calibration done.
    pub calibration_samples: u32,
    /// Delay before the simulated actuators report feedback [ms].
    pub actuator_online_after_ms: u64,
    /// Drop both actuators after this many ms (0 = never).
    pub power_failure_after_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ambient_c: 25.0,
            heating_rate_c_per_s: 20.0,
            passive_heating_c_per_s: 2.0,
            setpoint_c: 63.0,
            calibration_samples: 0,
            actuator_online_after_ms: 300,
            power_failure_after_ms: 0,
        }
    }
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete control-core configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "gimbal-01"
///
/// [attitude]
/// update_hz = 1000
///
/// [thermal]
/// warmup_threshold_c = 61.0
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GimbalConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub attitude: AttitudeConfig,
    #[serde(default)]
    pub thermal: ThermalConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub imu: ImuConfig,
    #[serde(default)]
    pub heading: HeadingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl GimbalConfig {
    /// Validate parameter bounds.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let a = &self.attitude;
        if !(ATTITUDE_UPDATE_HZ_MIN..=ATTITUDE_UPDATE_HZ_MAX).contains(&a.update_hz) {
            return Err(invalid(format!(
                "attitude.update_hz {} out of range [{}, {}]",
                a.update_hz, ATTITUDE_UPDATE_HZ_MIN, ATTITUDE_UPDATE_HZ_MAX
            )));
        }
        if a.stack_size < ATTITUDE_STACK_SIZE_MIN {
            return Err(invalid(format!(
                "attitude.stack_size {} below minimum {}",
                a.stack_size, ATTITUDE_STACK_SIZE_MIN
            )));
        }
        if a.priority_offset > ATTITUDE_PRIORITY_OFFSET_MAX {
            return Err(invalid(format!(
                "attitude.priority_offset {} above maximum {}",
                a.priority_offset, ATTITUDE_PRIORITY_OFFSET_MAX
            )));
        }
        check_temperature("attitude.warning_low_c", a.warning_low_c)?;
        check_temperature("attitude.warning_high_c", a.warning_high_c)?;
        if a.warning_low_c >= a.warning_high_c {
            return Err(invalid(format!(
                "attitude warning band [{}, {}] is empty",
                a.warning_low_c, a.warning_high_c
            )));
        }

        check_temperature("thermal.warmup_threshold_c", self.thermal.warmup_threshold_c)?;
        if self.thermal.warmup_threshold_c <= 0.0 {
            return Err(invalid(format!(
                "thermal.warmup_threshold_c {} must be above 0",
                self.thermal.warmup_threshold_c
            )));
        }
        check_poll("thermal.poll_interval_ms", self.thermal.poll_interval_ms)?;
        check_poll("monitor.poll_interval_ms", self.monitor.poll_interval_ms)?;
        check_poll(
            "monitor.startup_poll_interval_ms",
            self.monitor.startup_poll_interval_ms,
        )?;

        if self.heading.address > 0x7F {
            return Err(invalid(format!(
                "heading.address {:#04x} is not a 7-bit address",
                self.heading.address
            )));
        }
        if self.heading.rate_hz == 0 || self.heading.rate_hz > HEADING_RATE_HZ_MAX {
            return Err(invalid(format!(
                "heading.rate_hz {} out of range [1, {}]",
                self.heading.rate_hz, HEADING_RATE_HZ_MAX
            )));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

fn check_temperature(field: &str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || !(TEMP_CONFIG_MIN_C..=TEMP_CONFIG_MAX_C).contains(&value) {
        return Err(invalid(format!(
            "{field} {value} out of range [{TEMP_CONFIG_MIN_C}, {TEMP_CONFIG_MAX_C}]"
        )));
    }
    Ok(())
}

fn check_poll(field: &str, value: u64) -> Result<(), ConfigError> {
    if !(POLL_MS_MIN..=POLL_MS_MAX).contains(&value) {
        return Err(invalid(format!(
            "{field} {value} out of range [{POLL_MS_MIN}, {POLL_MS_MAX}]"
        )));
    }
    Ok(())
}
