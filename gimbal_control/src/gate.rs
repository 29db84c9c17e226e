//! Gate module root.
//!
//! Blocking preconditions on the attitude loop: thermal warm-up before fusion
//! starts, and calibration completeness while it runs.

pub mod calibration;
pub mod thermal;
