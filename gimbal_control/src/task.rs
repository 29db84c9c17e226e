//! Task creation and RT process setup.
//!
//! Each periodic loop runs in its own named task with an explicit stack budget
//! and priority, built through [`TaskBuilder`].
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to an isolated CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO)`: RT priority.
//!
//! Without the `rt` feature every RT call is a no-op and priorities are only
//! recorded for logging.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::error::ControlError;

/// Extra stack reserved on hosted targets for std, unwinding and tracing on
/// top of the configured application budget.
pub const HOST_STACK_RESERVE: usize = 256 * 1024;

/// Highest `SCHED_FIFO` priority on Linux.
pub const RT_PRIORITY_MAX: i32 = 99;

/// Default base priority for the normal-priority context.
pub const RT_PRIORITY_DEFAULT: i32 = 40;

/// Scheduling class of a task, relative to the process base priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    Normal,
    /// Above normal by the given offset.
    Elevated(u8),
}

impl TaskPriority {
    /// Resolve against the base `SCHED_FIFO` priority, clamped to `1..=99`.
    pub const fn resolve(&self, base: i32) -> i32 {
        let p = match self {
            Self::Normal => base,
            Self::Elevated(offset) => base.saturating_add(*offset as i32),
        };
        if p < 1 {
            1
        } else if p > RT_PRIORITY_MAX {
            RT_PRIORITY_MAX
        } else {
            p
        }
    }
}

/// Builder for a named control task.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    name: String,
    stack_size: usize,
    priority: TaskPriority,
    base_priority: i32,
    cpu_core: Option<usize>,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: gimbal_common::consts::ATTITUDE_STACK_SIZE,
            priority: TaskPriority::Normal,
            base_priority: RT_PRIORITY_DEFAULT,
            cpu_core: None,
        }
    }

    /// Application stack budget [bytes].
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Process base priority that [`TaskPriority`] is relative to.
    pub fn base_priority(mut self, base: i32) -> Self {
        self.base_priority = base;
        self
    }

    /// Pin the task to a CPU core.
    pub fn cpu_core(mut self, core: usize) -> Self {
        self.cpu_core = Some(core);
        self
    }

    /// Effective `SCHED_FIFO` priority of the task.
    pub fn rt_priority(&self) -> i32 {
        self.priority.resolve(self.base_priority)
    }

    /// Start the task.
    ///
    /// RT placement (affinity, priority) is applied inside the new thread
    /// before `f` runs; a failure there is returned here and `f` never runs.
    pub fn spawn<F, T>(self, f: F) -> Result<TaskHandle<T>, ControlError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let rt_priority = self.rt_priority();
        let cpu_core = self.cpu_core;
        let (setup_tx, setup_rx) = mpsc::channel::<Result<(), ControlError>>();

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .stack_size(self.stack_size + HOST_STACK_RESERVE)
            .spawn(move || {
                let setup = apply_placement(cpu_core, rt_priority);
                let ok = setup.is_ok();
                let _ = setup_tx.send(setup);
                if !ok {
                    return None;
                }
                Some(f())
            })
            .map_err(|source| ControlError::TaskSpawn {
                name: self.name.clone(),
                source,
            })?;

        match setup_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => return Err(ControlError::TaskTerminated(self.name)),
        }

        info!(
            task = %self.name,
            stack = self.stack_size,
            priority = rt_priority,
            "task started"
        );

        Ok(TaskHandle {
            name: self.name,
            handle,
        })
    }
}

/// Handle to a running task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    name: String,
    handle: JoinHandle<Option<T>>,
}

impl<T> TaskHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task. A panicking task maps to `TaskTerminated`.
    pub fn join(self) -> Result<T, ControlError> {
        match self.handle.join() {
            Ok(Some(value)) => Ok(value),
            _ => Err(ControlError::TaskTerminated(self.name)),
        }
    }
}

fn apply_placement(cpu_core: Option<usize>, rt_priority: i32) -> Result<(), ControlError> {
    if let Some(core) = cpu_core {
        rt_set_affinity(core)?;
    }
    rt_set_scheduler(rt_priority)?;
    debug!(?cpu_core, rt_priority, "task placement applied");
    Ok(())
}

// ─── RT primitives ──────────────────────────────────────────────────
//
// Each primitive has an `rt` variant that talks to the kernel and a
// simulation variant that succeeds without side effects, so the same call
// sites run on a workstation and on the gimbal controller.

/// Keep the whole process resident, including stacks of tasks spawned later.
///
/// A page fault inside the attitude loop costs more than a 1 kHz period.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), ControlError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    let flags = MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE;
    mlockall(flags).map_err(|e| ControlError::RtSetup(format!("memory lock refused: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), ControlError> {
    Ok(())
}

/// Write through a scratch buffer on the supervisor stack so the pages the
/// startup gates and monitor poll use are already mapped.
fn prefault_stack() {
    const PREFAULT_BYTES: usize = 64 * 1024;
    let mut scratch = [0u8; PREFAULT_BYTES];
    for byte in &mut scratch {
        // SAFETY: `byte` is a valid, exclusive reference into `scratch`.
        unsafe { core::ptr::write_volatile(byte, 0xA5) };
    }
    core::hint::black_box(&scratch);
}

/// Restrict the calling task to one core, keeping the attitude loop off the
/// cores that service interrupts.
#[cfg(feature = "rt")]
fn rt_set_affinity(core: usize) -> Result<(), ControlError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cores = CpuSet::new();
    cores
        .set(core)
        .map_err(|e| ControlError::RtSetup(format!("core {core} not addressable: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cores)
        .map_err(|e| ControlError::RtSetup(format!("pinning to core {core} refused: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_core: usize) -> Result<(), ControlError> {
    Ok(())
}

/// Move the calling task into the `SCHED_FIFO` class at an already resolved
/// priority (see [`TaskPriority::resolve`]).
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), ControlError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 names the calling thread.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } == 0 {
        return Ok(());
    }
    Err(ControlError::RtSetup(format!(
        "FIFO priority {priority} refused: {}",
        std::io::Error::last_os_error()
    )))
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), ControlError> {
    Ok(())
}

/// Prepare the supervisor thread: lock memory, map its stack, pin it and
/// give it the normal-priority FIFO slot.
///
/// Runs before the attitude task is spawned so `MCL_FUTURE` also covers
/// that task's stack. Every step is a no-op in simulation builds.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), ControlError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(TaskPriority::Normal.resolve(rt_priority))
}
