//! Errors raised while bringing the control core up.
//!
//! Once both loops are running the core reports problems only through
//! diagnostic flags; the only terminal path after that is the fail-safe reset.

use gimbal_common::config::ConfigError;
use gimbal_common::drivers::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// OS refused to create a task.
    #[error("failed to spawn task '{name}': {source}")]
    TaskSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A collaborator failed during bring-up.
    #[error("{stage} failed: {source}")]
    Driver {
        stage: &'static str,
        #[source]
        source: DriverError,
    },

    /// A task ended that must run for the process lifetime.
    #[error("task '{0}' terminated")]
    TaskTerminated(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ControlError {
    pub(crate) fn driver(stage: &'static str) -> impl FnOnce(DriverError) -> Self {
        move |source| Self::Driver { stage, source }
    }
}
