//! # Waypoint Framework
//!
//! Destination-based message dispatch.
//!
//! This layer provides:
//! - Destination pattern matching with captures and wildcards ([`matcher`])
//! - Argument resolvers binding headers, path variables and payloads ([`resolver`])
//! - Handler method descriptions and the [`Controller`] contract ([`handler`])
//! - A registry mapping patterns to handler methods per mapping kind ([`registry`])
//! - The [`Dispatcher`], which routes each inbound message to the best match
//!   and forwards its return value ([`dispatcher`])
//!
//! Handler methods are usually declared with `#[controller]` from the
//! `waypoint-macros` crate; [`HandlerMethod::builder`] is the equivalent
//! hand-written form. Without the `waypoint` facade, point the macro here
//! with `#[controller(crate = "::waypoint_framework")]`.

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod matcher;
pub mod registry;
pub mod resolver;
pub mod service;

pub use dispatcher::{DEFAULT_BROKER_PREFIX, DispatchOptions, Dispatched, Dispatcher, IgnoreReason};
pub use error::{
    ArgumentResolutionError, BoxError, DispatchError, DispatchResult, InvocationError,
    InvokeError, PatternError, RegistrationError, RegistrationResult, ResolveResult,
};
pub use handler::{
    ArgumentValue, Arguments, BindingType, Controller, DeclaredType, HandlerMethod,
    HandlerMethodBuilder, IntoReply, Json, Mapping, MappingKind, ParameterDescriptor, Reply,
    ResolutionKind, ValueKind,
};
pub use matcher::{DestinationPattern, PathMatcher, PathVariables};
pub use registry::{HandlerRegistry, MatchResult};
pub use resolver::{ArgumentResolver, DefaultPayloadConverter, PayloadConverter, ResolverChain};
