//! # Gimbal Control Core
//!
//! Real-time control core of a motorized gimbal: a fixed-period attitude
//! estimation loop gated on thermal warm-up and sensor calibration, and a
//! supervisory monitor that resets the platform when both gimbal actuators
//! lose power at once.
//!
//! ## Execution Contexts
//!
//! 1. **Attitude task** (elevated priority): sensor bring-up, thermal gate,
//!    then [`attitude::AttitudeLoop`] driven by [`cycle::DeadlineScheduler`].
//! 2. **Supervisor** (normal priority): startup liveness gate, later init,
//!    then [`safety::monitor::SupervisoryMonitor`] polling actuator health.
//!
//! ## Shared State
//!
//! `SensorState` is owned by the attitude task. Only its diagnostic
//! `ErrorFlags` (lock-free `fetch_or`) are visible to other contexts.
//! Actuator health is written by the CAN driver and read by the supervisor
//! as one atomic word.
//!
//! ## Termination
//!
//! There is no graceful shutdown. The only terminal path is
//! [`safety::reset::FailSafeReset::trigger_hard_reset`].

pub mod attitude;
pub mod clock;
pub mod cycle;
pub mod error;
pub mod fusion;
pub mod gate;
pub mod poll;
pub mod runtime;
pub mod safety;
pub mod sim;
pub mod task;
