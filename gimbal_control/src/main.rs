//! # Gimbal Control
//!
//! Host build of the gimbal control core. Loads the TOML configuration,
//! performs RT setup, wires the simulated board collaborators and runs the
//! attitude task and the supervisory monitor until the fail-safe resets the
//! process.

use clap::Parser;
use gimbal_common::config::{ConfigError, ConfigLoader, GimbalConfig, LogLevel};
use gimbal_common::sensor::SensorState;
use gimbal_control::attitude::{AttitudeLoop, TemperatureBand};
use gimbal_control::error::ControlError;
use gimbal_control::fusion::ComplementaryFilter;
use gimbal_control::gate::calibration::CalibrationGate;
use gimbal_control::runtime::{run_supervisor, spawn_attitude_task};
use gimbal_control::safety::monitor::SupervisoryMonitor;
use gimbal_control::sim::{SharedClock, SimPlatform, later_init, spawn_calibration_routine};
use gimbal_control::task::rt_setup;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Time the simulated calibration routine takes per acknowledged step.
const CALIBRATION_SETTLE: Duration = Duration::from_millis(250);

/// Gimbal Control: attitude loop and fail-safe supervisor
#[derive(Parser, Debug)]
#[command(name = "gimbal_control")]
#[command(version)]
#[command(about = "Gimbal attitude estimation and fail-safe control core")]
struct Args {
    /// Path to the TOML configuration (board defaults if omitted).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CPU core to pin the process to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// Base SCHED_FIFO priority; the attitude task runs above it (default: 40).
    #[arg(long, default_value_t = 40, value_parser = clap::value_parser!(i32).range(1..=99))]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("Gimbal control v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.map_err(ControlError::from).and_then(|c| run(&args, c)) {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<GimbalConfig, ConfigError> {
    let config = match &args.config {
        Some(path) => GimbalConfig::load(path)?,
        None => GimbalConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: GimbalConfig) -> Result<(), ControlError> {
    match &args.config {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => warn!("No config file given, using board defaults"),
    }
    info!(
        service = %config.shared.service_name,
        log_level = config.shared.log_level.as_directive(),
        update_hz = config.attitude.update_hz,
        warmup_c = config.thermal.warmup_threshold_c,
        "Config OK"
    );

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let clock = host_clock();
    let platform = SimPlatform::new(Arc::clone(&clock), &config.simulation);
    let state = SensorState::new();
    let errors = state.error_flags();

    let gate = Arc::new(CalibrationGate::new());
    let attitude = AttitudeLoop::new(
        platform.imu,
        platform.heading,
        ComplementaryFilter::new(config.attitude.period()),
        Arc::clone(&gate),
    )
    .with_band(TemperatureBand::from_config(&config.attitude));

    let _calibration =
        spawn_calibration_routine(gate.resume_handle(), Arc::clone(&clock), CALIBRATION_SETTLE)?;
    let _bus = platform.bus.spawn(Arc::clone(&clock))?;

    let attitude_task = spawn_attitude_task(
        attitude,
        platform.heater,
        Arc::clone(&clock),
        state,
        &config,
        args.rt_priority,
    )?;

    let monitor = SupervisoryMonitor::new(
        Arc::clone(&platform.health),
        Arc::clone(&platform.led),
        host_reset(),
        clock,
        &config.monitor,
    );

    match run_supervisor(&monitor, || later_init(&attitude_task, &errors))? {}
}

#[cfg(feature = "rt")]
fn host_clock() -> SharedClock {
    Arc::new(gimbal_control::clock::RtClock::new())
}

#[cfg(not(feature = "rt"))]
fn host_clock() -> SharedClock {
    Arc::new(gimbal_control::clock::MonotonicClock::new())
}

#[cfg(feature = "rt")]
fn host_reset() -> gimbal_control::safety::reset::RebootReset {
    gimbal_control::safety::reset::RebootReset
}

#[cfg(not(feature = "rt"))]
fn host_reset() -> gimbal_control::safety::reset::AbortReset {
    gimbal_control::safety::reset::AbortReset::default()
}

fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match configured {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
