//! Gimbal Common Library
//!
//! Shared data model for the gimbal control workspace: diagnostic and health
//! flag sets, the attitude loop's sensor state, the traits through which the
//! control core reaches its hardware collaborators, and TOML configuration.
//!
//! # Module Structure
//!
//! - [`consts`] - Numeric defaults and validation bounds
//! - [`flags`] - `ErrorKind` / `ActuatorHealth` bitflags and their atomic containers
//! - [`sensor`] - `SensorState`, lifecycle, samples and attitude
//! - [`drivers`] - Collaborator traits (IMU, heading sensor, heater, fusion, health)
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use gimbal_common::prelude::*;
//!
//! let errors = ErrorFlags::new();
//! errors.raise(ErrorKind::FRAME_OVERRUN);
//! assert!(errors.snapshot().contains(ErrorKind::FRAME_OVERRUN));
//! ```

pub mod config;
pub mod consts;
pub mod drivers;
pub mod flags;
pub mod prelude;
pub mod sensor;
