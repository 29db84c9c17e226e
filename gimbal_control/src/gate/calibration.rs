//! Calibration gate: Open ⇄ Suspended.
//!
//! The attitude loop suspends itself here while accelerometer or gyroscope
//! calibration is incomplete and stays blocked until a calibration routine or
//! operator command calls [`CalibrationGate::resume`].
//!
//! Lost wakeups are ruled out with a resume epoch: the loop takes a
//! [`SuspendTicket`] before it samples and checks calibration, and
//! [`CalibrationGate::suspend`] returns at once if any resume landed after the
//! ticket was taken. Every state change happens under one lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use static_assertions::assert_impl_all;
use tracing::{debug, info};

/// Gate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Open,
    Suspended,
}

/// Resume epoch observed before the calibration check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspendTicket(u64);

/// How [`CalibrationGate::suspend`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendOutcome {
    /// Blocked, then released by `resume`.
    Resumed,
    /// A resume arrived between the ticket and the suspend; never blocked.
    ResumedBeforeSuspend,
}

#[derive(Debug)]
struct Inner {
    state: GateState,
    resumes: u64,
}

#[derive(Debug)]
pub struct CalibrationGate {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl CalibrationGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: GateState::Open,
                resumes: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Capture the resume epoch. Take it before evaluating calibration.
    pub fn ticket(&self) -> SuspendTicket {
        SuspendTicket(self.inner.lock().resumes)
    }

    /// Suspend the calling context until resumed.
    pub fn suspend(&self, ticket: SuspendTicket) -> SuspendOutcome {
        let mut inner = self.inner.lock();
        if inner.resumes != ticket.0 {
            debug!("resume already pending, not suspending");
            return SuspendOutcome::ResumedBeforeSuspend;
        }

        inner.state = GateState::Suspended;
        self.changed.notify_all();
        info!("attitude loop suspended, waiting for calibration");

        while inner.state == GateState::Suspended {
            self.changed.wait(&mut inner);
        }
        SuspendOutcome::Resumed
    }

    /// Release a suspended loop. Returns `true` if one was suspended.
    ///
    /// Calling this while the gate is open is not lost: a loop that took its
    /// ticket before this call will not block on its next `suspend`.
    pub fn resume(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.resumes = inner.resumes.wrapping_add(1);
        let was_suspended = inner.state == GateState::Suspended;
        inner.state = GateState::Open;
        drop(inner);
        self.changed.notify_all();
        if was_suspended {
            info!("attitude loop resumed");
        }
        was_suspended
    }

    pub fn state(&self) -> GateState {
        self.inner.lock().state
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.state() == GateState::Suspended
    }

    /// Block until the gate is suspended or `timeout` elapses.
    ///
    /// Lets a calibration routine wait for the loop to park before it starts
    /// driving the sensor.
    ///
    /// A timeout too large to express as a deadline waits without limit.
    pub fn wait_for_suspension(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        while inner.state != GateState::Suspended {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut inner, deadline).timed_out() {
                        return inner.state == GateState::Suspended;
                    }
                }
                None => self.changed.wait(&mut inner),
            }
        }
        true
    }

    /// Cloneable handle for collaborators that only resume.
    pub fn resume_handle(self: &Arc<Self>) -> ResumeHandle {
        ResumeHandle(Arc::clone(self))
    }
}

impl Default for CalibrationGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Resume-only view of a [`CalibrationGate`].
#[derive(Debug, Clone)]
pub struct ResumeHandle(Arc<CalibrationGate>);

impl ResumeHandle {
    pub fn resume(&self) -> bool {
        self.0.resume()
    }

    pub fn is_suspended(&self) -> bool {
        self.0.is_suspended()
    }

    pub fn wait_for_suspension(&self, timeout: Duration) -> bool {
        self.0.wait_for_suspension(timeout)
    }
}

assert_impl_all!(CalibrationGate: Send, Sync);
assert_impl_all!(ResumeHandle: Send, Sync, Clone);
