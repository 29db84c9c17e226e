//! Startup orchestration of the two execution contexts.
//!
//! ```text
//! attitude task:  init sensors → thermal gate → periodic loop (forever)
//! supervisor:     startup liveness gate → later init → health loop (forever)
//! ```

use std::convert::Infallible;

use gimbal_common::config::GimbalConfig;
use gimbal_common::drivers::{
    ActuatorHealthSource, FaultIndicator, FusionEngine, HeadingSensor, PrimaryImu,
    TemperatureController,
};
use gimbal_common::sensor::SensorState;
use tracing::info;

use crate::attitude::AttitudeLoop;
use crate::clock::ClockSource;
use crate::cycle::DeadlineScheduler;
use crate::error::ControlError;
use crate::gate::thermal::ThermalGate;
use crate::safety::monitor::SupervisoryMonitor;
use crate::safety::reset::ResetFacility;
use crate::task::{TaskBuilder, TaskHandle, TaskPriority};

/// Initialize the sensors and start the attitude task.
///
/// Sensor bring-up runs on the caller so that a failing driver aborts startup
/// with an error. Warm-up and the periodic loop run inside the task.
pub fn spawn_attitude_task<I, H, F, T, C>(
    mut attitude: AttitudeLoop<I, H, F>,
    mut controller: T,
    clock: C,
    mut state: SensorState,
    config: &GimbalConfig,
    base_priority: i32,
) -> Result<TaskHandle<Infallible>, ControlError>
where
    I: PrimaryImu + Send + 'static,
    H: HeadingSensor + Send + 'static,
    F: FusionEngine + Send + 'static,
    T: TemperatureController + Send + 'static,
    C: ClockSource + 'static,
{
    attitude.initialize(&config.imu, &config.heading)?;

    let thermal = ThermalGate::from_config(&config.thermal);
    let period = config.attitude.period();

    TaskBuilder::new(gimbal_common::consts::ATTITUDE_TASK_NAME)
        .stack_size(config.attitude.stack_size)
        .priority(TaskPriority::Elevated(config.attitude.priority_offset))
        .base_priority(base_priority)
        .spawn(move || -> Infallible {
            attitude.warm_up(&thermal, &clock, &mut controller, &mut state);
            let mut scheduler = DeadlineScheduler::new(clock, period, state.error_flags());
            attitude.run(&mut scheduler, &mut state)
        })
}

/// Supervisor context: gate later init on actuator liveness, then monitor.
///
/// Only returns if `later_init` fails.
pub fn run_supervisor<H, L, R, C, G>(
    monitor: &SupervisoryMonitor<H, L, R, C>,
    later_init: G,
) -> Result<Infallible, ControlError>
where
    H: ActuatorHealthSource,
    L: FaultIndicator,
    R: ResetFacility,
    C: ClockSource,
    G: FnOnce() -> Result<(), ControlError>,
{
    monitor.check_startup_ready();
    later_init()?;
    info!("later init complete");
    monitor.run()
}
