//! Waypoint Runtime - Configuration, logging and the serve loop.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `WaypointConfig`)
//! - Logging initialization (`LoggingBuilder`, `init_from_config`)
//! - Runtime orchestration (`WaypointRuntime`), which feeds inbound messages
//!   from a channel into the dispatcher
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use waypoint_core::ChannelSendingOperations;
//! use waypoint_runtime::WaypointRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sender, mut replies) = ChannelSendingOperations::channel();
//!     let runtime = WaypointRuntime::builder()
//!         .controller(Arc::new(Chat))
//!         .sender(sender)
//!         .build()?;
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(256);
//!     // hand `tx` to the transport, forward `replies` back out
//!     runtime.run(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, DispatchConfig, LoggingConfig, WaypointConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, init_from_config};
pub use runtime::{RuntimeBuilder, ServeStats, WaypointRuntime};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;
pub use tokio_util::sync::CancellationToken;

/// Commonly used logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
