//! Fixed-period deadline scheduler with overrun re-anchoring.
//!
//! ## Cycle Loop
//! Each wake advances the target by exactly one period and sleeps until it,
//! so without overruns the n-th wake happens at `t0 + n·period` with no
//! accumulated drift.
//!
//! ## Overrun
//! When the clock has already reached the advanced target, the cycle is lost:
//! the target is re-anchored to "now", `FRAME_OVERRUN` is raised and the body
//! runs immediately. Missed cycles are never replayed.
//!
//! ## Resync
//! A body that returns [`CycleControl::Resync`] (after a calibration suspend)
//! makes the next wake happen immediately at the current clock, without an
//! overrun, and the cadence continues from there.

use std::sync::Arc;
use std::time::Duration;

use gimbal_common::flags::{ErrorFlags, ErrorKind};
use tracing::{debug, warn};

use crate::clock::{ClockSource, Tick};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Timing record of the attitude loop, updated after every body.
///
/// The body duration is measured from the wake to the body's return, so it
/// covers the sensor read and fusion but not the sleep. Wake latency is how
/// far the wake landed past its deadline; overrun and resync wakes are
/// anchored to the wake itself and therefore contribute zero latency.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Bodies executed, resync and overrun wakes included.
    pub cycles: u64,
    /// Duration of the most recent body [ns].
    pub last_body_ns: u64,
    /// Shortest body [ns]; `u64::MAX` until the first cycle.
    pub min_body_ns: u64,
    /// Longest body [ns].
    pub max_body_ns: u64,
    total_body_ns: u64,
    /// Frames lost to a body that ran past the next deadline.
    pub overruns: u64,
    /// Cadence re-anchors after a calibration suspend.
    pub resyncs: u64,
    /// Worst oversleep past an on-time deadline [ns].
    pub max_wake_latency_ns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycles: 0,
            last_body_ns: 0,
            min_body_ns: u64::MAX,
            max_body_ns: 0,
            total_body_ns: 0,
            overruns: 0,
            resyncs: 0,
            max_wake_latency_ns: 0,
        }
    }

    /// Account one body that ran for `body` after `wake`.
    #[inline]
    pub fn record(&mut self, wake: &Wake, body: Duration) {
        let body_ns = saturating_nanos(body);
        let latency_ns = saturating_nanos(wake.woke_at.saturating_duration_since(wake.deadline));

        self.cycles += 1;
        self.last_body_ns = body_ns;
        self.min_body_ns = self.min_body_ns.min(body_ns);
        self.max_body_ns = self.max_body_ns.max(body_ns);
        self.total_body_ns = self.total_body_ns.saturating_add(body_ns);
        self.max_wake_latency_ns = self.max_wake_latency_ns.max(latency_ns);
    }

    /// Mean body duration [ns], 0 before the first cycle.
    #[inline]
    pub fn mean_body_ns(&self) -> u64 {
        self.total_body_ns.checked_div(self.cycles).unwrap_or(0)
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

// ─── Wake ───────────────────────────────────────────────────────────

/// How a cycle was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeKind {
    /// Slept until the deadline.
    OnTime,
    /// Deadline already passed; re-anchored to now.
    Overrun,
    /// First wake after a resync request.
    Resync,
}

/// One scheduler wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    /// Deadline this cycle is anchored to.
    pub deadline: Tick,
    /// Clock value right after waking.
    pub woke_at: Tick,
    pub kind: WakeKind,
}

/// Body verdict returned to [`DeadlineScheduler::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleControl<B> {
    Continue,
    /// The body blocked outside the cadence; re-anchor the next wake to now.
    Resync,
    Break(B),
}

// ─── Scheduler ──────────────────────────────────────────────────────

/// Drives a body at a fixed period.
pub struct DeadlineScheduler<C> {
    clock: C,
    period: Duration,
    next_wake: Tick,
    resync_pending: bool,
    errors: Arc<ErrorFlags>,
    stats: CycleStats,
}

impl<C: ClockSource> DeadlineScheduler<C> {
    /// Create a scheduler whose target is anchored at the current clock.
    ///
    /// Overruns are reported into `errors`.
    pub fn new(clock: C, period: Duration, errors: Arc<ErrorFlags>) -> Self {
        let next_wake = clock.now();
        Self {
            clock,
            period,
            next_wake,
            resync_pending: false,
            errors,
            stats: CycleStats::new(),
        }
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadline of the most recent wake (or the initial anchor).
    #[inline]
    pub fn next_wake(&self) -> Tick {
        self.next_wake
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Re-anchor the next wake to the current clock without an overrun.
    pub fn resync(&mut self) {
        self.resync_pending = true;
    }

    /// Wait for the next cycle boundary.
    pub fn wait_next(&mut self) -> Wake {
        let now = self.clock.now();

        if self.resync_pending {
            self.resync_pending = false;
            self.next_wake = now;
            self.stats.resyncs += 1;
            debug!(tick = now.as_nanos(), "cadence re-anchored after suspend");
            return Wake {
                deadline: now,
                woke_at: now,
                kind: WakeKind::Resync,
            };
        }

        let target = self.next_wake + self.period;
        if now < target {
            self.clock.sleep_until(target);
            self.next_wake = target;
            Wake {
                deadline: target,
                woke_at: self.clock.now(),
                kind: WakeKind::OnTime,
            }
        } else {
            self.next_wake = now;
            self.stats.overruns += 1;
            let late = now.saturating_duration_since(target);
            if self.errors.raise(ErrorKind::FRAME_OVERRUN).is_empty() {
                debug!(late_ns = late.as_nanos() as u64, overruns = self.stats.overruns, "frame lost");
            } else {
                warn!(
                    late_ns = late.as_nanos() as u64,
                    period_ns = self.period.as_nanos() as u64,
                    "frame lost, cadence re-anchored"
                );
            }
            Wake {
                deadline: now,
                woke_at: now,
                kind: WakeKind::Overrun,
            }
        }
    }

    /// Run `body` once per wake until it breaks.
    ///
    /// Production bodies never break, so this never returns under normal
    /// operation.
    pub fn run<B, F>(&mut self, mut body: F) -> B
    where
        F: FnMut(&Wake) -> CycleControl<B>,
    {
        loop {
            let wake = self.wait_next();
            let control = body(&wake);
            let elapsed = self.clock.now().saturating_duration_since(wake.woke_at);
            self.stats.record(&wake, elapsed);

            match control {
                CycleControl::Continue => {}
                CycleControl::Resync => self.resync(),
                CycleControl::Break(value) => return value,
            }
        }
    }
}
