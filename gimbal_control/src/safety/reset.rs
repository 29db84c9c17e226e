//! Fail-safe hardware reset.
//!
//! A half-controlled gimbal is more dangerous than an abrupt restart, so once
//! triggered there is no recovery path: outstanding writes are fenced, a
//! system reset is requested through the [`ResetFacility`] and the caller
//! spins until the reset takes the core away.
//!
//! The request word follows the Cortex-M AIRCR layout: write key in the upper
//! half-word, the existing PRIGROUP field carried over unchanged, and
//! SYSRESETREQ set.

use std::sync::atomic::{Ordering, fence};

use tracing::error;

/// AIRCR write key position.
pub const AIRCR_VECTKEY_POS: u32 = 16;
/// AIRCR write key; writes without it are ignored by the hardware.
pub const AIRCR_VECTKEY: u32 = 0x05FA << AIRCR_VECTKEY_POS;
/// Interrupt priority grouping field.
pub const AIRCR_PRIGROUP_MASK: u32 = 0x7 << 8;
/// System reset request bit.
pub const AIRCR_SYSRESETREQ: u32 = 1 << 2;

/// Interrupt priority grouping bits, kept across the reset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PriorityGroup(u32);

impl PriorityGroup {
    /// Extract the PRIGROUP field from a raw AIRCR value.
    #[inline]
    pub const fn from_aircr(aircr: u32) -> Self {
        Self(aircr & AIRCR_PRIGROUP_MASK)
    }

    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

/// AIRCR value that requests a system reset while keeping `group`.
#[inline]
pub const fn reset_request_word(group: PriorityGroup) -> u32 {
    AIRCR_VECTKEY | group.bits() | AIRCR_SYSRESETREQ
}

/// The irreversible platform reset primitive.
pub trait ResetFacility: Send + Sync {
    /// Priority grouping currently configured.
    fn priority_group(&self) -> PriorityGroup;

    /// Write the reset request. On real hardware this does not return.
    fn request_system_reset(&self, aircr: u32);
}

/// Diverging fail-safe reset.
#[derive(Debug)]
pub struct FailSafeReset<R> {
    facility: R,
}

impl<R: ResetFacility> FailSafeReset<R> {
    pub fn new(facility: R) -> Self {
        Self { facility }
    }

    pub fn facility(&self) -> &R {
        &self.facility
    }

    /// Reset the platform. Never returns; no application code runs after it.
    pub fn trigger_hard_reset(&self) -> ! {
        // All buffered writes complete before the reset request.
        fence(Ordering::SeqCst);
        let word = reset_request_word(self.facility.priority_group());
        self.facility.request_system_reset(word);
        fence(Ordering::SeqCst);

        loop {
            core::hint::spin_loop();
        }
    }
}

// ─── Host facilities ────────────────────────────────────────────────

/// Simulation reset: logs the request word and aborts the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortReset {
    group: PriorityGroup,
}

impl AbortReset {
    pub fn new(group: PriorityGroup) -> Self {
        Self { group }
    }
}

impl ResetFacility for AbortReset {
    fn priority_group(&self) -> PriorityGroup {
        self.group
    }

    fn request_system_reset(&self, aircr: u32) {
        error!(aircr = format_args!("{aircr:#010x}"), "SYSTEM RESET");
        std::process::abort();
    }
}

/// Production reset on a Linux controller: immediate reboot without syncing.
#[cfg(feature = "rt")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RebootReset;

#[cfg(feature = "rt")]
impl ResetFacility for RebootReset {
    fn priority_group(&self) -> PriorityGroup {
        PriorityGroup::default()
    }

    fn request_system_reset(&self, aircr: u32) {
        use nix::sys::reboot::{RebootMode, reboot};

        error!(aircr = format_args!("{aircr:#010x}"), "SYSTEM RESET (reboot)");
        match reboot(RebootMode::RB_AUTOBOOT) {
            Ok(never) => match never {},
            Err(e) => {
                error!("reboot failed: {e}, aborting");
                std::process::abort();
            }
        }
    }
}
