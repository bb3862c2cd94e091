//! Handler methods for the Waypoint framework.
//!
//! - **Parameters** ([`parameter`]): [`ParameterDescriptor`] says where an
//!   argument comes from and which Rust type it binds to.
//! - **Binding** ([`binding`]): resolved [`ArgumentValue`]s and the
//!   [`BindingType`] conversions back to typed arguments.
//! - **Replies** ([`reply`]): [`IntoReply`] for handler return values.
//! - **Methods** ([`method`]): [`HandlerMethod`], its builder, and the
//!   [`Controller`] trait that groups methods on one instance.
//!
//! # Example
//!
//! ```rust,ignore
//! use waypoint::prelude::*;
//!
//! struct Orders;
//!
//! #[controller(prefix = "/orders")]
//! impl Orders {
//!     #[message_mapping("/{id}")]
//!     fn update(&self, #[path_variable] id: i64, #[payload] body: String) -> String {
//!         format!("order {id}: {body}")
//!     }
//! }
//! ```

pub mod binding;
pub mod method;
pub mod parameter;
pub mod reply;

pub use binding::{ArgumentValue, Arguments, BindingType, Json};
pub use method::{Controller, HandlerMethod, HandlerMethodBuilder, Invoker, Mapping, MappingKind};
pub use parameter::{DeclaredType, ParameterDescriptor, ResolutionKind, ValueKind};
pub use reply::{APPLICATION_JSON, IntoReply, Reply, TEXT_PLAIN};
