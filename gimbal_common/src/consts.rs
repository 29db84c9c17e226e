//! System-wide constants for the gimbal workspace.
//!
//! Single source of truth for defaults and validation bounds. Defaults mirror
//! the board firmware timing.

/// Attitude update rate [Hz] (1 kHz IMU output data rate).
pub const ATTITUDE_UPDATE_HZ: u32 = 1000;
pub const ATTITUDE_UPDATE_HZ_MIN: u32 = 50;
pub const ATTITUDE_UPDATE_HZ_MAX: u32 = 8000;

/// Attitude task stack size [bytes].
pub const ATTITUDE_STACK_SIZE: usize = 4096;
/// Smallest stack the attitude task is allowed to run on [bytes].
pub const ATTITUDE_STACK_SIZE_MIN: usize = 4096;

/// Priority offset of the attitude task above the normal task priority.
pub const ATTITUDE_PRIORITY_OFFSET: u8 = 5;
pub const ATTITUDE_PRIORITY_OFFSET_MAX: u8 = 40;

/// Name given to the attitude task.
pub const ATTITUDE_TASK_NAME: &str = "IMU Attitude Estimator";

/// Sensor-package temperature that ends the warm-up gate [°C].
pub const WARMUP_THRESHOLD_C: f32 = 61.0;

/// Warm-up polling interval [ms].
pub const WARMUP_POLL_MS: u64 = 50;

/// Lower edge of the safe operating band [°C].
pub const TEMP_WARNING_LOW_C: f32 = 55.0;

/// Upper edge of the safe operating band [°C].
pub const TEMP_WARNING_HIGH_C: f32 = 70.0;

/// Physically plausible temperature range accepted in configuration [°C].
pub const TEMP_CONFIG_MIN_C: f32 = -40.0;
pub const TEMP_CONFIG_MAX_C: f32 = 125.0;

/// Supervisory monitor polling interval [ms].
pub const MONITOR_POLL_MS: u64 = 200;

/// Startup liveness polling interval [ms].
pub const STARTUP_POLL_MS: u64 = 100;

/// Bounds for every configurable polling interval [ms].
pub const POLL_MS_MIN: u64 = 1;
pub const POLL_MS_MAX: u64 = 10_000;

/// Heading sensor output rate [Hz].
pub const HEADING_RATE_HZ: u16 = 200;
pub const HEADING_RATE_HZ_MAX: u16 = 1000;

/// Heading sensor I2C address with the address pins left floating.
pub const HEADING_ADDR_FLOATING: u8 = 0x0E;
