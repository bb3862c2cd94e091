//! # Waypoint
//!
//! Destination-based message dispatch for Rust.
//!
//! ## Overview
//!
//! Inbound messages carry a destination such as `/app/rooms/42/post`. Waypoint
//! routes each one to the most specific handler method whose pattern matches,
//! binds the method's parameters from headers, path variables and the payload,
//! and sends the return value on to a reply destination.
//!
//! ```text
//! ┌───────────┐    ┌──────────────────────────┐    ┌──────────────┐    ┌────────┐
//! │ Transport │───▶│ Runtime (serve loop)     │───▶│ Dispatcher   │───▶│ Sender │──▶ broker / session
//! │           │    │ one task per message     │    │ lookup, bind │    │        │
//! └───────────┘    └──────────────────────────┘    └──────────────┘    └────────┘
//! ```
//!
//! - **Core**: Message model and the outbound sending contract
//! - **Framework**: Pattern matcher, argument resolvers, handler registry, dispatcher
//! - **Macros**: `#[controller]` turns an `impl` block into handler methods
//! - **Runtime**: Configuration, logging and the serve loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waypoint::prelude::*;
//!
//! struct Chat;
//!
//! #[controller]
//! impl Chat {
//!     #[message_mapping("/rooms/{room}/post")]
//!     #[send_to("/topic/rooms/{room}")]
//!     fn post(&self, #[path_variable] room: String, #[payload] text: String) -> String {
//!         format!("[{room}] {text}")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sender, replies) = ChannelSendingOperations::channel();
//!     let runtime = WaypointRuntime::builder()
//!         .controller(Arc::new(Chat))
//!         .sender(sender)
//!         .build()?;
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(256);
//!     runtime.run(rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! Code generated by `#[controller]` reaches the framework through
//! `::waypoint::framework`, so depending on `waypoint` alone is enough.
//!
//! ## Features
//!
//! - `macros`: Enable the `#[controller]` attribute (default)
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use waypoint_core as core;
pub use waypoint_framework as framework;
pub use waypoint_runtime as runtime;

#[cfg(feature = "macros")]
pub use waypoint_macros::controller;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use waypoint::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use waypoint_runtime::{WaypointConfig, WaypointRuntime};

    // Messages and reply channels
    pub use waypoint_core::{
        ChannelSendingOperations, Message, MessageHeaders, MessageSendingOperations,
        MessageType, Payload, SendTarget,
    };

    // Handler declaration
    #[cfg(feature = "macros")]
    pub use waypoint_macros::controller;
    pub use waypoint_framework::{
        Controller, HandlerMethod, HandlerRegistry, Json, ParameterDescriptor, Reply,
    };

    // Direct dispatch
    pub use waypoint_framework::{DispatchOptions, Dispatched, Dispatcher};
}
