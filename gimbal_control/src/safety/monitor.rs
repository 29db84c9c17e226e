//! Supervisory monitor.
//!
//! Runs at normal priority beside the attitude loop. During bring-up it gates
//! the later init stages on actuator feedback liveness; afterwards it polls
//! actuator health for the rest of the process lifetime and trips the
//! fail-safe reset when both gimbal axes drop out at once.

use std::time::Duration;

use gimbal_common::config::MonitorConfig;
use gimbal_common::drivers::{ActuatorHealthSource, FaultIndicator};
use gimbal_common::flags::ActuatorHealth;
use tracing::{debug, error, info};

use crate::clock::ClockSource;
use crate::poll::Poller;
use crate::safety::reset::{FailSafeReset, ResetFacility};

/// Result of one health poll that did not trip the reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Both axes present.
    Healthy,
    /// One axis missing; reported, not acted upon.
    AxisLost(ActuatorHealth),
}

pub struct SupervisoryMonitor<H, L, R, C> {
    health: H,
    indicator: L,
    reset: FailSafeReset<R>,
    clock: C,
    poll_interval: Duration,
    startup_poll_interval: Duration,
}

impl<H, L, R, C> SupervisoryMonitor<H, L, R, C>
where
    H: ActuatorHealthSource,
    L: FaultIndicator,
    R: ResetFacility,
    C: ClockSource,
{
    pub fn new(health: H, indicator: L, reset: R, clock: C, config: &MonitorConfig) -> Self {
        Self {
            health,
            indicator,
            reset: FailSafeReset::new(reset),
            clock,
            poll_interval: config.poll_interval(),
            startup_poll_interval: config.startup_poll_interval(),
        }
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn reset(&self) -> &FailSafeReset<R> {
        &self.reset
    }

    /// Non-blocking liveness check.
    #[inline]
    pub fn is_startup_ready(&self) -> bool {
        self.health.snapshot().is_updated()
    }

    /// Block until the actuator feedback driver reports liveness.
    ///
    /// Polls at the coarse startup interval. Always returns `true`; there is
    /// no timeout.
    pub fn check_startup_ready(&self) -> bool {
        let attempts = Poller::new(&self.clock, self.startup_poll_interval)
            .until(|| self.is_startup_ready());
        info!(attempts, "actuator feedback online");
        true
    }

    /// Pitch and yaw are both disconnected in one snapshot.
    #[inline]
    pub fn is_fail_safe_triggered(&self) -> bool {
        self.health.snapshot().is_power_failure()
    }

    /// One supervisory check. Does not return if the fail-safe trips.
    pub fn poll_once(&self) -> MonitorVerdict {
        let health = self.health.snapshot();
        if health.is_power_failure() {
            self.trip(health);
        }

        let lost = health.intersection(ActuatorHealth::POWER_FAILURE_MASK);
        if lost.is_empty() {
            MonitorVerdict::Healthy
        } else {
            debug!(health = ?lost, "single gimbal axis disconnected");
            MonitorVerdict::AxisLost(lost)
        }
    }

    /// Supervisory loop. Never returns.
    pub fn run(&self) -> ! {
        info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            "supervisory monitor running"
        );
        loop {
            self.poll_once();
            self.clock.sleep_for(self.poll_interval);
        }
    }

    fn trip(&self, health: ActuatorHealth) -> ! {
        self.indicator.assert_fault();
        error!(?health, "FAIL-SAFE: pitch and yaw actuators lost, resetting");
        self.reset.trigger_hard_reset()
    }
}
