//! Argument resolvers.
//!
//! Each [`ArgumentResolver`] knows how to produce one kind of handler
//! argument from an inbound message. A [`ResolverChain`] holds them in a
//! fixed priority order:
//!
//! 1. [`HeaderResolver`]: a single named header
//! 2. [`HeadersResolver`]: the full header map
//! 3. [`PathVariableResolver`]: a variable captured by the matched pattern
//! 4. [`PayloadResolver`]: the message body, via a [`PayloadConverter`]
//! 5. [`MessageResolver`]: the whole message
//!
//! The first resolver whose [`supports`](ArgumentResolver::supports) accepts
//! a parameter is chosen once, when the handler method is registered. A
//! parameter nothing supports is rejected at registration rather than at
//! dispatch time.

mod coerce;
pub mod header;
pub mod path;
pub mod payload;

use std::fmt;
use std::sync::Arc;

use waypoint_core::Message;

use crate::error::ResolveResult;
use crate::handler::{ArgumentValue, ParameterDescriptor};
use crate::matcher::PathVariables;

pub use header::{HeaderResolver, HeadersResolver, MessageResolver};
pub use path::PathVariableResolver;
pub use payload::{DefaultPayloadConverter, PayloadConverter, PayloadResolver};

/// Produces one handler argument from an inbound message.
pub trait ArgumentResolver: Send + Sync {
    /// A short name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Returns `true` if this resolver can bind `param`.
    fn supports(&self, param: &ParameterDescriptor) -> bool;

    /// Resolves `param` from `message` and the variables captured by the
    /// matched pattern.
    fn resolve(
        &self,
        param: &ParameterDescriptor,
        message: &Message,
        variables: &PathVariables,
    ) -> ResolveResult<ArgumentValue>;
}

/// The ordered set of resolvers used by a registry.
#[derive(Clone)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ArgumentResolver>>,
}

impl ResolverChain {
    /// Builds the default chain around a custom payload converter.
    pub fn with_payload_converter(converter: Arc<dyn PayloadConverter>) -> Self {
        Self {
            resolvers: vec![
                Arc::new(HeaderResolver),
                Arc::new(HeadersResolver),
                Arc::new(PathVariableResolver),
                Arc::new(PayloadResolver::new(converter)),
                Arc::new(MessageResolver),
            ],
        }
    }

    /// Returns the index of the first resolver supporting `param`.
    pub fn select(&self, param: &ParameterDescriptor) -> Option<usize> {
        self.resolvers.iter().position(|r| r.supports(param))
    }

    pub fn get(&self, index: usize) -> Option<&dyn ArgumentResolver> {
        self.resolvers.get(index).map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::with_payload_converter(Arc::new(DefaultPayloadConverter))
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.resolvers.iter().map(|r| r.name()))
            .finish()
    }
}
