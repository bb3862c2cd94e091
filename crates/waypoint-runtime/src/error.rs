//! Runtime error types.

use thiserror::Error;
use waypoint_framework::RegistrationError;

use crate::config::ConfigError;

/// Errors that can occur while building or running a [`crate::WaypointRuntime`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A controller or handler method failed to register.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// No outbound channel was given to the builder.
    #[error("No message sender configured")]
    MissingSender,

    /// Installing the shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
