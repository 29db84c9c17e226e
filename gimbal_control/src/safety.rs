//! Safety module root.
//!
//! Supervisory power-loss detection and the irreversible fail-safe reset.

pub mod monitor;
pub mod reset;
