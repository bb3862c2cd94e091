//! Handler methods and the controller contract.

use std::fmt;
use std::sync::Arc;

use waypoint_core::MessageType;

use super::binding::Arguments;
use super::parameter::ParameterDescriptor;
use super::reply::{IntoReply, Reply};
use crate::error::InvokeError;
use crate::matcher::PathMatcher;

/// The mapping namespace a handler method is registered under.
///
/// Each kind has its own pattern table, so the same pattern text may be
/// mapped once per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingKind {
    /// Request/response mapping for plain messages.
    Message,
    /// Mapping for subscription requests.
    Subscribe,
}

impl MappingKind {
    /// Returns the mapping kind that handles `message_type`, if any.
    pub fn for_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            MessageType::Message => Some(Self::Message),
            MessageType::Subscribe => Some(Self::Subscribe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The destinations a method is mapped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub kind: MappingKind,
    /// Pattern strings; parsed when the method is registered.
    pub patterns: Vec<String>,
}

/// Type-erased call into a handler method with bound arguments.
pub type Invoker = Arc<dyn Fn(Arguments) -> Result<Option<Reply>, InvokeError> + Send + Sync>;

/// One mapped handler method.
///
/// The owning controller instance lives inside the invoker closure.
#[derive(Clone)]
pub struct HandlerMethod {
    name: String,
    mapping: Option<Mapping>,
    parameters: Vec<ParameterDescriptor>,
    send_to: Option<String>,
    invoker: Invoker,
    /// Resolver index per parameter, filled in at registration.
    pub(crate) resolver_plan: Vec<usize>,
}

impl HandlerMethod {
    /// Starts describing a handler method.
    pub fn builder(name: impl Into<String>) -> HandlerMethodBuilder {
        HandlerMethodBuilder {
            name: name.into(),
            mapping: None,
            prefix: None,
            send_to: None,
            parameters: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the mapping, or `None` for an unmapped method.
    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_ref()
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Returns the explicit reply destination, if declared.
    pub fn send_to(&self) -> Option<&str> {
        self.send_to.as_deref()
    }

    /// Calls the handler with already-bound arguments.
    pub fn invoke(&self, args: Arguments) -> Result<Option<Reply>, InvokeError> {
        (self.invoker)(args)
    }
}

impl fmt::Debug for HandlerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("name", &self.name)
            .field("mapping", &self.mapping)
            .field("parameters", &self.parameters)
            .field("send_to", &self.send_to)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder returned by [`HandlerMethod::builder`].
///
/// ```rust
/// use waypoint_framework::{HandlerMethod, ParameterDescriptor};
///
/// let method = HandlerMethod::builder("Greeter::greet")
///     .message_mapping(["/greet/{name}"])
///     .param(ParameterDescriptor::path_variable::<String>("name"))
///     .handler(|mut args| Ok(format!("hello {}", args.take::<String>(0)?)));
///
/// assert_eq!(method.parameters().len(), 1);
/// ```
#[derive(Debug)]
pub struct HandlerMethodBuilder {
    name: String,
    mapping: Option<Mapping>,
    prefix: Option<String>,
    send_to: Option<String>,
    parameters: Vec<ParameterDescriptor>,
}

impl HandlerMethodBuilder {
    fn mapping<I, S>(mut self, kind: MappingKind, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mapping = Some(Mapping {
            kind,
            patterns: patterns.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Maps the method to plain messages sent to any of `patterns`.
    pub fn message_mapping<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mapping(MappingKind::Message, patterns)
    }

    /// Maps the method to subscriptions to any of `patterns`.
    pub fn subscribe_mapping<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mapping(MappingKind::Subscribe, patterns)
    }

    /// Joins `prefix` onto every pattern. A mapping without patterns maps to
    /// the prefix itself.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sends replies to `destination` instead of the default target.
    pub fn send_to(mut self, destination: impl Into<String>) -> Self {
        self.send_to = Some(destination.into());
        self
    }

    /// Declares the next parameter.
    pub fn param(mut self, descriptor: ParameterDescriptor) -> Self {
        let index = self.parameters.len();
        self.parameters.push(descriptor.with_index(index));
        self
    }

    /// Finishes the method with its body.
    ///
    /// `f` receives the bound arguments in declaration order.
    pub fn handler<F, R>(self, f: F) -> HandlerMethod
    where
        F: Fn(Arguments) -> Result<R, InvokeError> + Send + Sync + 'static,
        R: IntoReply,
    {
        let mapping = match (self.mapping, self.prefix.as_deref()) {
            (Some(mut mapping), Some(prefix)) => {
                mapping.patterns = if mapping.patterns.is_empty() {
                    vec![PathMatcher.combine(prefix, "")]
                } else {
                    mapping
                        .patterns
                        .iter()
                        .map(|p| PathMatcher.combine(prefix, p))
                        .collect()
                };
                Some(mapping)
            }
            (mapping, _) => mapping,
        };

        let invoker: Invoker = Arc::new(move |args: Arguments| {
            let returned = f(args)?;
            Ok(returned.into_reply()?)
        });

        HandlerMethod {
            name: self.name,
            mapping,
            parameters: self.parameters,
            send_to: self.send_to,
            invoker,
            resolver_plan: Vec::new(),
        }
    }
}

// =============================================================================
// Controller
// =============================================================================

/// A type whose methods handle messages.
///
/// Usually implemented by `#[controller]`; a hand-written implementation
/// returns one [`HandlerMethod`] per mapped method.
pub trait Controller: Send + Sync + 'static {
    /// Describes every mapped method, each holding a clone of `self`.
    fn handler_methods(self: Arc<Self>) -> Vec<HandlerMethod>;

    /// A name for log output.
    fn controller_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvocationError;

    #[test]
    fn test_mapping_kind_for_message_type() {
        assert_eq!(
            MappingKind::for_message_type(MessageType::Message),
            Some(MappingKind::Message)
        );
        assert_eq!(
            MappingKind::for_message_type(MessageType::Subscribe),
            Some(MappingKind::Subscribe)
        );
        assert_eq!(MappingKind::for_message_type(MessageType::Heartbeat), None);
    }

    #[test]
    fn test_builder_applies_prefix() {
        let method = HandlerMethod::builder("m")
            .prefix("/app/")
            .message_mapping(["/a", "b/{x}"])
            .handler(|_| Ok(()));

        let mapping = method.mapping().unwrap();
        assert_eq!(mapping.kind, MappingKind::Message);
        assert_eq!(mapping.patterns, vec!["/app/a", "/app/b/{x}"]);
    }

    #[test]
    fn test_empty_mapping_takes_prefix() {
        let method = HandlerMethod::builder("m")
            .prefix("/room/")
            .message_mapping(Vec::<String>::new())
            .handler(|_| Ok(()));
        assert_eq!(method.mapping().unwrap().patterns, vec!["/room"]);

        let bare = HandlerMethod::builder("b")
            .message_mapping(Vec::<String>::new())
            .handler(|_| Ok(()));
        assert!(bare.mapping().unwrap().patterns.is_empty());
    }

    #[test]
    fn test_param_indices_follow_declaration() {
        let method = HandlerMethod::builder("m")
            .subscribe_mapping(["/s"])
            .param(ParameterDescriptor::header::<String>("a"))
            .param(ParameterDescriptor::payload::<String>())
            .handler(|_| Ok(()));

        let indices: Vec<_> = method.parameters().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_invoke_converts_return_value() {
        let method = HandlerMethod::builder("m")
            .message_mapping(["/x"])
            .handler(|_| Ok("done"));
        let reply = method.invoke(Arguments::new()).unwrap().unwrap();
        assert_eq!(reply.payload.as_str(), Some("done"));

        let failing = HandlerMethod::builder("f")
            .message_mapping(["/y"])
            .handler(|_| Ok(Err::<(), _>(InvocationError::new("nope"))));
        assert!(matches!(
            failing.invoke(Arguments::new()),
            Err(InvokeError::Invocation(_))
        ));
    }
}
