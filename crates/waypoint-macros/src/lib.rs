//! Procedural macros for the Waypoint dispatch framework.
//!
//! This crate provides:
//!
//! - `#[controller]` - Turns an inherent `impl` block into a
//!   `waypoint_framework::Controller`
//!
//! # Controller Attribute
//!
//! ```rust,ignore
//! use waypoint::prelude::*;
//!
//! struct Chat;
//!
//! #[controller(prefix = "/chat")]
//! impl Chat {
//!     #[message_mapping("/{room}")]
//!     #[send_to("/topic/rooms/{room}")]
//!     fn post(&self, #[path_variable] room: String, #[payload] text: String) -> String {
//!         format!("[{room}] {text}")
//!     }
//!
//!     #[subscribe_mapping("/{room}/history")]
//!     fn history(&self, #[path_variable] room: String) -> Json<Vec<String>> {
//!         Json(Vec::new())
//!     }
//! }
//! ```

mod controller;

use proc_macro::TokenStream;
use syn::{ItemImpl, parse_macro_input};

/// Generates a `Controller` implementation from mapping attributes.
///
/// # Method attributes
///
/// - `#[message_mapping("/a", "/b")]` - Handle plain messages sent to any pattern
/// - `#[subscribe_mapping("/x")]` - Handle subscriptions to any pattern
/// - `#[send_to("/topic/y")]` - Send the return value here; `{name}`
///   placeholders are filled from path variables
///
/// Methods without a mapping attribute are left alone. Mapped methods must be
/// synchronous, non-generic and take `&self`.
///
/// # Parameter attributes
///
/// - `#[header]`, `#[header("name")]`,
///   `#[header(name = "…", default = "…", required = false)]`
/// - `#[headers]` - The full `MessageHeaders` map
/// - `#[path_variable]`, `#[path_variable("name")]`
/// - `#[payload]`, `#[payload(required = false)]`
///
/// A parameter without an attribute binds by type: `MessageHeaders` to all
/// headers, `Message` to the whole message, anything else to the payload.
///
/// # Arguments
///
/// - `prefix = "/app"` - Joined onto every pattern in the block; a bare
///   `#[message_mapping]` maps to the prefix itself
/// - `crate = "::waypoint_framework"` - Path the generated code uses to reach
///   the framework, for crates that depend on `waypoint-framework` without
///   the `waypoint` facade. Defaults to `::waypoint::framework`.
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemImpl);

    match controller::expand(attr.into(), item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
