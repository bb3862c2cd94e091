//! Configuration module for the Waypoint runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for dispatch routing and logging.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
    WaypointConfig,
};
pub use validation::validate_config;
