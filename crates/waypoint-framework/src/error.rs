//! Error types for the Waypoint framework.
//!
//! Errors fall into two phases:
//!
//! - **Registration** ([`RegistrationError`], [`PatternError`]): raised while
//!   handler methods are being registered at startup. These are fatal; the
//!   process should not start serving.
//! - **Dispatch** ([`DispatchError`]): raised per inbound message. They abort
//!   that message only and never touch registry state.

use thiserror::Error;

use waypoint_core::{SendError, SendTarget};

use crate::handler::MappingKind;

/// A boxed error returned by handler code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A destination pattern could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// `**` appeared before the last segment.
    #[error("'{pattern}': '**' is only allowed as the last segment")]
    DoubleWildcardNotLast { pattern: String },

    /// A capture segment had no name (`{}`).
    #[error("'{pattern}': empty variable name")]
    EmptyVariable { pattern: String },

    /// The same capture name appeared twice.
    #[error("'{pattern}': variable '{name}' captured more than once")]
    DuplicateVariable { pattern: String, name: String },

    /// A segment mixed braces with other text.
    #[error("'{pattern}': malformed segment '{segment}'")]
    MalformedSegment { pattern: String, segment: String },
}

/// Handler registration failed.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// Two methods claimed the same pattern under the same mapping kind.
    #[error(
        "duplicate {kind} mapping '{pattern}': already mapped to '{existing}', cannot also map '{duplicate}'"
    )]
    DuplicateMapping {
        kind: MappingKind,
        pattern: String,
        /// The method already holding the pattern.
        existing: String,
        /// The method that tried to claim it.
        duplicate: String,
    },

    /// A declared pattern is malformed.
    #[error("invalid pattern on '{method}': {source}")]
    InvalidPattern {
        method: String,
        #[source]
        source: PatternError,
    },

    /// No argument resolver can bind a declared parameter.
    #[error("unsupported parameter #{index} of '{method}': {reason}")]
    UnsupportedParameter {
        method: String,
        index: usize,
        reason: String,
    },
}

/// Result type for registration.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// A handler argument could not be produced from the inbound message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentResolutionError {
    /// A required header was absent and no default was configured.
    #[error("missing header '{name}'")]
    MissingHeader { name: String },

    /// The matched pattern did not capture the requested variable.
    #[error("missing path variable '{name}'")]
    MissingPathVariable { name: String },

    /// A required payload was empty.
    #[error("missing payload for parameter '{parameter}'")]
    MissingPayload { parameter: String },

    /// A raw value could not be coerced to the declared type.
    #[error("cannot bind '{value}' to parameter '{parameter}' of type {expected}")]
    TypeMismatch {
        parameter: String,
        value: String,
        expected: &'static str,
    },

    /// A structured conversion (payload decoding, JSON deserialization) failed.
    #[error("cannot convert parameter '{parameter}' to {expected}: {reason}")]
    Conversion {
        parameter: String,
        expected: &'static str,
        reason: String,
    },

    /// No bound value exists at this position.
    #[error("no argument bound at position {index}")]
    Unbound { index: usize },
}

/// Result type for argument resolution.
pub type ResolveResult<T> = Result<T, ArgumentResolutionError>;

/// A handler method returned an error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InvocationError(#[source] BoxError);

impl InvocationError {
    /// Wraps any error.
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

/// Failure of a handler method's invoker: either a late binding step or the
/// handler body itself.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Resolution(#[from] ArgumentResolutionError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Dispatch of a single message failed.
///
/// "No handler matched" is not an error; see
/// [`Dispatched::Ignored`](crate::dispatcher::Dispatched::Ignored).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// An argument could not be bound. The handler was not invoked.
    #[error("failed to resolve arguments for '{method}': {source}")]
    Resolution {
        method: String,
        #[source]
        source: ArgumentResolutionError,
    },

    /// The handler returned an error. Nothing was forwarded.
    #[error("handler '{method}' failed: {source}")]
    Invocation {
        method: String,
        #[source]
        source: InvocationError,
    },

    /// The reply could not be handed to the outbound sender.
    #[error("failed to forward reply of '{method}' to {target}: {source}")]
    Send {
        method: String,
        target: SendTarget,
        #[source]
        source: SendError,
    },
}

impl DispatchError {
    /// Returns the name of the handler method involved.
    pub fn method(&self) -> &str {
        match self {
            Self::Resolution { method, .. }
            | Self::Invocation { method, .. }
            | Self::Send { method, .. } => method,
        }
    }

    pub(crate) fn from_invoke(method: &str, error: InvokeError) -> Self {
        match error {
            InvokeError::Resolution(source) => Self::Resolution {
                method: method.to_string(),
                source,
            },
            InvokeError::Invocation(source) => Self::Invocation {
                method: method.to_string(),
                source,
            },
        }
    }
}

/// Result type for dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;
