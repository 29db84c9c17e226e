//! Diagnostic and actuator-health bitflags.
//!
//! Both flag sets use the `bitflags` crate for compact representation and are
//! stored in single atomic words so that concurrent readers always observe a
//! whole snapshot, never a torn multi-bit value.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use bitflags::bitflags;
use static_assertions::assert_impl_all;

bitflags! {
    /// Attitude-loop diagnostic flags.
    ///
    /// Additive: the control core only ever raises these. Clearing is an
    /// administrative action outside the loops.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ErrorKind: u8 {
        /// Initial temperature read was not physically valid (<= 0 °C).
        /// Temperature controller left disarmed.
        const TEMPERATURE_SENSOR_FAULT = 0x01;
        /// Temperature left the safe operating band during normal operation.
        const TEMPERATURE_WARNING      = 0x02;
        /// A scheduling deadline was missed (frame lost).
        const FRAME_OVERRUN            = 0x04;
    }
}

impl Default for ErrorKind {
    fn default() -> Self {
        Self::empty()
    }
}

/// Lock-free shared container for [`ErrorKind`].
///
/// The attitude loop is the writer; diagnostic readers take snapshots from any
/// thread.
#[derive(Debug, Default)]
pub struct ErrorFlags {
    bits: AtomicU8,
}

impl ErrorFlags {
    /// Create an empty flag set.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }

    /// Atomically set `kind`. Returns the flags that were newly raised by
    /// this call (empty if all were already set).
    #[inline]
    pub fn raise(&self, kind: ErrorKind) -> ErrorKind {
        let previous = self.bits.fetch_or(kind.bits(), Ordering::AcqRel);
        kind.difference(ErrorKind::from_bits_truncate(previous))
    }

    /// Consistent snapshot of all flags.
    #[inline]
    pub fn snapshot(&self) -> ErrorKind {
        ErrorKind::from_bits_truncate(self.bits.load(Ordering::Acquire))
    }

    /// Whether every flag in `kind` is currently set.
    #[inline]
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.snapshot().contains(kind)
    }

    /// Administrative clear. Never called by the control loops.
    pub fn clear(&self, kind: ErrorKind) {
        self.bits.fetch_and(!kind.bits(), Ordering::AcqRel);
    }
}

bitflags! {
    /// Aggregate gimbal actuator / power health, as published by the CAN
    /// feedback driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ActuatorHealth: u32 {
        /// No feedback from the pitch motor controller.
        const PITCH_NOT_CONNECTED = 0x0000_0001;
        /// No feedback from the yaw motor controller.
        const YAW_NOT_CONNECTED   = 0x0000_0002;
        /// At least one feedback frame has been received (24 V rail is up).
        const FEEDBACK_UPDATED    = 0x8000_0000;
    }
}

impl ActuatorHealth {
    /// Both gimbal axes lost at the same time: the vehicle's 24 V rail is gone.
    pub const POWER_FAILURE_MASK: Self = Self::from_bits_truncate(
        Self::PITCH_NOT_CONNECTED.bits() | Self::YAW_NOT_CONNECTED.bits(),
    );

    /// Returns true only when pitch AND yaw are both disconnected.
    #[inline]
    pub const fn is_power_failure(&self) -> bool {
        self.contains(Self::POWER_FAILURE_MASK)
    }

    /// Liveness flag used by the startup gate.
    #[inline]
    pub const fn is_updated(&self) -> bool {
        self.contains(Self::FEEDBACK_UPDATED)
    }
}

impl Default for ActuatorHealth {
    fn default() -> Self {
        Self::empty()
    }
}

/// Single-word atomic cell holding the latest [`ActuatorHealth`].
#[derive(Debug, Default)]
pub struct SharedActuatorHealth {
    bits: AtomicU32,
}

impl SharedActuatorHealth {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    /// Replace the whole health word.
    #[inline]
    pub fn publish(&self, health: ActuatorHealth) {
        self.bits.store(health.bits(), Ordering::Release);
    }

    /// Atomically set flags.
    #[inline]
    pub fn set(&self, flags: ActuatorHealth) {
        self.bits.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Atomically clear flags.
    #[inline]
    pub fn clear(&self, flags: ActuatorHealth) {
        self.bits.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    #[inline]
    pub fn load(&self) -> ActuatorHealth {
        ActuatorHealth::from_bits_truncate(self.bits.load(Ordering::Acquire))
    }
}

assert_impl_all!(ErrorFlags: Send, Sync);
assert_impl_all!(SharedActuatorHealth: Send, Sync);
