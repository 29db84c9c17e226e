//! Monotonic time source for both control loops.
//!
//! [`ClockSource`] is the only way the core observes or waits on time, so the
//! same scheduler and gates run on the RT clock, the std clock, or the virtual
//! [`SimClock`] used by tests and replay.

use std::ops::{Add, AddAssign};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time point [ns since an arbitrary epoch].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tick(u64);

impl Tick {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future.
    #[inline]
    pub const fn saturating_duration_since(self, earlier: Tick) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Tick {
    type Output = Tick;

    #[inline]
    fn add(self, rhs: Duration) -> Tick {
        Tick(self.0.saturating_add(duration_nanos(rhs)))
    }
}

impl AddAssign<Duration> for Tick {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

#[inline]
fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Monotonic tick counter with absolute and relative sleeps.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> Tick;

    /// Block until `deadline`. Returns immediately if it already passed.
    fn sleep_until(&self, deadline: Tick);

    fn sleep_for(&self, duration: Duration) {
        self.sleep_until(self.now() + duration);
    }
}

impl<C: ClockSource + ?Sized> ClockSource for Arc<C> {
    #[inline]
    fn now(&self) -> Tick {
        (**self).now()
    }

    #[inline]
    fn sleep_until(&self, deadline: Tick) {
        (**self).sleep_until(deadline)
    }

    #[inline]
    fn sleep_for(&self, duration: Duration) {
        (**self).sleep_for(duration)
    }
}

impl<C: ClockSource + ?Sized> ClockSource for &C {
    #[inline]
    fn now(&self) -> Tick {
        (**self).now()
    }

    #[inline]
    fn sleep_until(&self, deadline: Tick) {
        (**self).sleep_until(deadline)
    }

    #[inline]
    fn sleep_for(&self, duration: Duration) {
        (**self).sleep_for(duration)
    }
}

// ─── std clock ──────────────────────────────────────────────────────

/// `std::time::Instant` clock with relative `thread::sleep`.
///
/// Used in simulation builds; wake-up jitter is whatever the host scheduler
/// gives us.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    fn now(&self) -> Tick {
        Tick(duration_nanos(self.origin.elapsed()))
    }

    fn sleep_until(&self, deadline: Tick) {
        let remaining = deadline.saturating_duration_since(self.now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

// ─── RT clock ───────────────────────────────────────────────────────

/// `CLOCK_MONOTONIC` with `clock_nanosleep(TIMER_ABSTIME)` for drift-free
/// absolute wake-ups.
#[cfg(feature = "rt")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RtClock;

#[cfg(feature = "rt")]
impl RtClock {
    const CLOCK: nix::time::ClockId = nix::time::ClockId::CLOCK_MONOTONIC;

    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "rt")]
impl ClockSource for RtClock {
    fn now(&self) -> Tick {
        // CLOCK_MONOTONIC cannot fail on Linux for a valid clock id.
        match nix::time::clock_gettime(Self::CLOCK) {
            Ok(ts) => Tick(timespec_to_nanos(&ts)),
            Err(_) => Tick::ZERO,
        }
    }

    fn sleep_until(&self, deadline: Tick) {
        use nix::errno::Errno;
        use nix::time::{ClockNanosleepFlags, clock_nanosleep};

        let ts = nanos_to_timespec(deadline.as_nanos());
        loop {
            match clock_nanosleep(Self::CLOCK, ClockNanosleepFlags::TIMER_ABSTIME, &ts) {
                Err(Errno::EINTR) => continue,
                _ => break,
            }
        }
    }
}

#[cfg(feature = "rt")]
fn timespec_to_nanos(ts: &nix::sys::time::TimeSpec) -> u64 {
    (ts.tv_sec() as u64) * 1_000_000_000 + ts.tv_nsec() as u64
}

#[cfg(feature = "rt")]
fn nanos_to_timespec(nanos: u64) -> nix::sys::time::TimeSpec {
    nix::sys::time::TimeSpec::new(
        (nanos / 1_000_000_000) as _,
        (nanos % 1_000_000_000) as _,
    )
}

// ─── Virtual clock ──────────────────────────────────────────────────

/// Virtual clock: sleeping advances time instantly.
///
/// Shared between threads through `Arc`; concurrent sleepers move time
/// forward monotonically (`fetch_max`). Tests inject long cycle bodies with
/// [`SimClock::advance`].
#[derive(Debug, Default)]
pub struct SimClock {
    now: AtomicU64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(Tick::ZERO)
    }

    pub fn starting_at(start: Tick) -> Self {
        Self {
            now: AtomicU64::new(start.as_nanos()),
        }
    }

    /// Move time forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.now.fetch_add(duration_nanos(d), Ordering::AcqRel);
    }

    /// Jump to `t` if it is later than the current time.
    pub fn advance_to(&self, t: Tick) {
        self.now.fetch_max(t.as_nanos(), Ordering::AcqRel);
    }
}

impl ClockSource for SimClock {
    #[inline]
    fn now(&self) -> Tick {
        Tick(self.now.load(Ordering::Acquire))
    }

    #[inline]
    fn sleep_until(&self, deadline: Tick) {
        self.advance_to(deadline);
        std::thread::yield_now();
    }
}
