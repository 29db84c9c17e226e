//! Attitude update loop.
//!
//! The body run by the [`DeadlineScheduler`] once per period. Each cycle, in
//! order:
//!
//! 1. Raise `TEMPERATURE_WARNING` if the last temperature is outside the safe
//!    band.
//! 2. Sample the primary IMU and refresh the heading sensor.
//! 3. Run sensor fusion.
//! 4. Suspend on the [`CalibrationGate`] while calibration is incomplete.
//!
//! Warm-up through the [`ThermalGate`] happens once before the first cycle.

use std::convert::Infallible;
use std::sync::Arc;

use gimbal_common::config::{AttitudeConfig, HeadingConfig, ImuConfig};
use gimbal_common::drivers::{FusionEngine, HeadingSensor, PrimaryImu, TemperatureController};
use gimbal_common::flags::ErrorKind;
use gimbal_common::sensor::{HeadingSample, SensorState};
use tracing::{debug, info, warn};

use crate::clock::ClockSource;
use crate::cycle::{CycleControl, DeadlineScheduler};
use crate::error::ControlError;
use crate::gate::calibration::{CalibrationGate, SuspendOutcome};
use crate::gate::thermal::{ThermalGate, WarmupOutcome};

/// Safe operating temperature band [°C], both edges inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBand {
    pub low: f32,
    pub high: f32,
}

impl TemperatureBand {
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    pub fn from_config(config: &AttitudeConfig) -> Self {
        Self::new(config.warning_low_c, config.warning_high_c)
    }

    /// NaN is never inside the band.
    #[inline]
    pub fn contains(&self, temperature: f32) -> bool {
        temperature >= self.low && temperature <= self.high
    }
}

impl Default for TemperatureBand {
    fn default() -> Self {
        Self::from_config(&AttitudeConfig::default())
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// A fresh IMU sample reached fusion.
    pub sampled: bool,
    /// The loop blocked on the calibration gate.
    pub suspended: bool,
}

/// Running totals for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttitudeCounters {
    pub cycles: u64,
    pub sample_failures: u64,
    pub heading_failures: u64,
    pub suspensions: u64,
}

pub struct AttitudeLoop<I, H, F> {
    imu: I,
    heading: H,
    fusion: F,
    gate: Arc<CalibrationGate>,
    band: TemperatureBand,
    last_heading: HeadingSample,
    counters: AttitudeCounters,
}

impl<I, H, F> AttitudeLoop<I, H, F>
where
    I: PrimaryImu,
    H: HeadingSensor,
    F: FusionEngine,
{
    pub fn new(imu: I, heading: H, fusion: F, gate: Arc<CalibrationGate>) -> Self {
        Self {
            imu,
            heading,
            fusion,
            gate,
            band: TemperatureBand::default(),
            last_heading: HeadingSample::default(),
            counters: AttitudeCounters::default(),
        }
    }

    pub fn with_band(mut self, band: TemperatureBand) -> Self {
        self.band = band;
        self
    }

    #[inline]
    pub fn band(&self) -> TemperatureBand {
        self.band
    }

    #[inline]
    pub fn counters(&self) -> &AttitudeCounters {
        &self.counters
    }

    pub fn gate(&self) -> &Arc<CalibrationGate> {
        &self.gate
    }

    pub fn imu(&self) -> &I {
        &self.imu
    }

    pub fn fusion(&self) -> &F {
        &self.fusion
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.gate.is_suspended()
    }

    /// Configure both sensors. Bring-up failures are fatal.
    pub fn initialize(
        &mut self,
        imu_config: &ImuConfig,
        heading_config: &HeadingConfig,
    ) -> Result<(), ControlError> {
        self.imu
            .initialize(imu_config)
            .map_err(ControlError::driver("primary IMU init"))?;
        self.heading
            .initialize(heading_config)
            .map_err(ControlError::driver("heading sensor init"))?;
        info!(
            accel = ?imu_config.accel_scale,
            gyro = ?imu_config.gyro_scale,
            heading_addr = format_args!("{:#04x}", heading_config.address),
            "sensors initialized"
        );
        Ok(())
    }

    /// Block on the thermal gate, then prime the fusion engine.
    pub fn warm_up<C, T>(
        &mut self,
        thermal: &ThermalGate,
        clock: &C,
        controller: &mut T,
        state: &mut SensorState,
    ) -> WarmupOutcome
    where
        C: ClockSource + ?Sized,
        T: TemperatureController + ?Sized,
    {
        let outcome = thermal.arm_and_wait_for_warmup(clock, state, &mut self.imu, controller);
        self.fusion.reset(state);
        outcome
    }

    /// One attitude update.
    pub fn cycle(&mut self, state: &mut SensorState) -> CycleReport {
        self.counters.cycles += 1;

        if !self.band.contains(state.temperature)
            && !state.raise(ErrorKind::TEMPERATURE_WARNING).is_empty()
        {
            warn!(
                temperature = state.temperature,
                low = self.band.low,
                high = self.band.high,
                "temperature outside safe band"
            );
        }

        // Taken before the calibration check so a resume issued from here on
        // releases the suspend below.
        let ticket = self.gate.ticket();

        let sample = match self.imu.sample() {
            Ok(sample) => sample,
            Err(e) => {
                self.counters.sample_failures += 1;
                warn!("IMU sample failed, skipping fusion: {e}");
                return CycleReport::default();
            }
        };
        match self.heading.refresh() {
            Ok(heading) => self.last_heading = heading,
            Err(e) => {
                self.counters.heading_failures += 1;
                debug!("heading refresh failed, reusing last reading: {e}");
            }
        }

        state.apply_sample(&sample);
        self.fusion.update(&sample, &self.last_heading, state);

        if state.calibration.is_complete() {
            return CycleReport {
                sampled: true,
                suspended: false,
            };
        }

        self.counters.suspensions += 1;
        debug!(calibration = ?state.calibration, "calibration incomplete");
        let suspended = match self.gate.suspend(ticket) {
            SuspendOutcome::Resumed => true,
            SuspendOutcome::ResumedBeforeSuspend => false,
        };
        CycleReport {
            sampled: true,
            suspended,
        }
    }

    /// Run the loop on `scheduler` forever.
    pub fn run<C: ClockSource>(
        &mut self,
        scheduler: &mut DeadlineScheduler<C>,
        state: &mut SensorState,
    ) -> ! {
        info!(
            period_us = scheduler.period().as_micros() as u64,
            "attitude loop running"
        );
        match scheduler.run(|_| self.step::<Infallible>(state)) {}
    }

    /// Run exactly `cycles` cycles on `scheduler`.
    pub fn run_for<C: ClockSource>(
        &mut self,
        scheduler: &mut DeadlineScheduler<C>,
        state: &mut SensorState,
        cycles: u64,
    ) {
        if cycles == 0 {
            return;
        }
        let mut remaining = cycles;
        scheduler.run(|_| {
            let control = self.step(state);
            remaining -= 1;
            if remaining == 0 {
                CycleControl::Break(())
            } else {
                control
            }
        });
    }

    fn step<B>(&mut self, state: &mut SensorState) -> CycleControl<B> {
        if self.cycle(state).suspended {
            CycleControl::Resync
        } else {
            CycleControl::Continue
        }
    }
}
