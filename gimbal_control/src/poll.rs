//! Poll-at-fixed-interval waits.
//!
//! Both blocking gates of the core (thermal warm-up and actuator liveness)
//! wait on conditions owned by hardware that cannot signal. They poll through
//! a [`Poller`], which yields the CPU between attempts via the clock and never
//! times out.

use std::time::Duration;

use crate::clock::ClockSource;

/// Repeatedly evaluates a condition, sleeping `interval` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct Poller<'a, C: ClockSource + ?Sized> {
    clock: &'a C,
    interval: Duration,
}

impl<'a, C: ClockSource + ?Sized> Poller<'a, C> {
    pub fn new(clock: &'a C, interval: Duration) -> Self {
        Self { clock, interval }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until `ready` returns `true`. Returns the number of evaluations.
    ///
    /// `ready` is evaluated first, so an already-satisfied condition costs no
    /// sleep. Unbounded: callers that need a deadline must build it into
    /// `ready`.
    pub fn until<F>(&self, mut ready: F) -> u32
    where
        F: FnMut() -> bool,
    {
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            if ready() {
                return attempts;
            }
            self.clock.sleep_for(self.interval);
        }
    }
}
