//! Prelude module for common re-exports.
//!
//! ```rust
//! use gimbal_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, GimbalConfig, LogLevel, SharedConfig};

// ─── Flags ──────────────────────────────────────────────────────────
pub use crate::flags::{ActuatorHealth, ErrorFlags, ErrorKind, SharedActuatorHealth};

// ─── Sensor State ───────────────────────────────────────────────────
pub use crate::sensor::{
    Attitude, CalibrationStatus, HeadingSample, ImuSample, Lifecycle, SensorState,
};

// ─── Collaborators ──────────────────────────────────────────────────
pub use crate::drivers::{
    ActuatorHealthSource, DriverError, FaultIndicator, FusionEngine, HeadingSensor, PrimaryImu,
    TemperatureController,
};
