//! Message dispatcher for the Waypoint framework.
//!
//! The [`Dispatcher`] owns a populated [`HandlerRegistry`] and an outbound
//! sender. Each call to [`handle_message`](Dispatcher::handle_message) runs
//! one message through a single pass:
//!
//! 1. Read the destination and message type; unroutable messages are ignored
//! 2. Strip a configured destination prefix
//! 3. Look up the best matching handler method
//! 4. Bind every parameter with its planned resolver
//! 5. Invoke the handler
//! 6. Forward a non-empty return value to the sender
//!
//! A failure in steps 4 to 6 aborts that message only. Nothing is retried
//! and nothing is forwarded for a failed invocation.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waypoint_core::{InMemorySendingOperations, Message};
//! use waypoint_framework::{Dispatcher, HandlerRegistry};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_handler(Arc::new(MyController))?;
//!
//! let dispatcher = Dispatcher::new(registry, Arc::new(InMemorySendingOperations::new()));
//! dispatcher.handle_message(&Message::builder().destination("/greet").build())?;
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{Level, debug, span, trace, warn};

use waypoint_core::{BoxedSender, Message, MessageHeaders, MessageType, SendTarget};

use crate::error::{ArgumentResolutionError, DispatchError, DispatchResult, ResolveResult};
use crate::handler::{Arguments, HandlerMethod, MappingKind, Reply};
use crate::matcher::PathVariables;
use crate::registry::{HandlerRegistry, MatchResult};

pub const DEFAULT_BROKER_PREFIX: &str = "/topic";

// =============================================================================
// Options
// =============================================================================

/// Routing options applied around registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    destination_prefixes: Vec<String>,
    broker_prefix: String,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            destination_prefixes: Vec::new(),
            broker_prefix: DEFAULT_BROKER_PREFIX.to_string(),
        }
    }
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only routes destinations under one of `prefixes`, stripping the prefix
    /// before lookup. An empty list routes everything.
    pub fn with_destination_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destination_prefixes = prefixes
            .into_iter()
            .map(|p| p.into().trim_end_matches('/').to_string())
            .collect();
        self
    }

    /// Sets the prefix prepended to a plain message's destination to form its
    /// default reply destination.
    pub fn with_broker_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.broker_prefix = prefix.into();
        self
    }

    pub fn destination_prefixes(&self) -> &[String] {
        &self.destination_prefixes
    }

    pub fn broker_prefix(&self) -> &str {
        &self.broker_prefix
    }

    /// Returns the destination used for lookup, or `None` if no configured
    /// prefix applies.
    pub fn lookup_destination<'a>(&self, destination: &'a str) -> Option<&'a str> {
        if self.destination_prefixes.is_empty() {
            return Some(destination);
        }
        self.destination_prefixes.iter().find_map(|prefix| {
            destination
                .strip_prefix(prefix.as_str())
                .filter(|rest| rest.starts_with('/'))
        })
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Why a message was not routed to any handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The message carried no destination header.
    NoDestination,
    /// The message type has no mapping kind (heartbeats, connects, ...).
    UnsupportedMessageType,
    /// The destination is outside every configured prefix.
    PrefixMismatch,
    /// No registered pattern matched.
    NoMatch,
}

/// What happened to a successfully processed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// No handler was invoked.
    Ignored(IgnoreReason),
    /// The handler ran and produced no reply.
    Handled { method: String },
    /// The handler ran and its reply was sent to `target`.
    Forwarded { method: String, target: SendTarget },
}

impl Dispatched {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }

    /// Returns the name of the invoked method, if any.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Ignored(_) => None,
            Self::Handled { method } | Self::Forwarded { method, .. } => Some(method),
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

struct DispatcherInner {
    registry: HandlerRegistry,
    sender: BoxedSender,
    options: DispatchOptions,
}

/// Routes inbound messages to handler methods.
///
/// Cloning is cheap; all clones share the same read-only registry, so a
/// dispatcher can be handed to any number of threads or tasks.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Creates a dispatcher with default options.
    pub fn new(registry: HandlerRegistry, sender: BoxedSender) -> Self {
        Self::with_options(registry, sender, DispatchOptions::default())
    }

    pub fn with_options(
        registry: HandlerRegistry,
        sender: BoxedSender,
        options: DispatchOptions,
    ) -> Self {
        debug!(
            methods = registry.method_count(),
            mappings = registry.mapping_count(),
            "Dispatcher ready"
        );
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                sender,
                options,
            }),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.inner.options
    }

    /// Dispatches one inbound message.
    ///
    /// Returns [`Dispatched::Ignored`] when the message is not routable or no
    /// pattern matches; that is not an error.
    pub fn handle_message(&self, message: &Message) -> DispatchResult<Dispatched> {
        let headers = message.headers();

        let Some(destination) = headers.destination() else {
            trace!("Ignoring message without destination");
            return Ok(Dispatched::Ignored(IgnoreReason::NoDestination));
        };
        let message_type = headers.message_type();
        let Some(kind) = MappingKind::for_message_type(message_type) else {
            trace!(%message_type, destination, "Ignoring unsupported message type");
            return Ok(Dispatched::Ignored(IgnoreReason::UnsupportedMessageType));
        };

        let span = span!(Level::DEBUG, "dispatch", %kind, destination);
        let _enter = span.enter();

        let Some(lookup) = self.inner.options.lookup_destination(destination) else {
            trace!("Destination outside configured prefixes");
            return Ok(Dispatched::Ignored(IgnoreReason::PrefixMismatch));
        };

        let Some(matched) = self.inner.registry.lookup(kind, lookup) else {
            debug!(lookup, "No matching handler");
            return Ok(Dispatched::Ignored(IgnoreReason::NoMatch));
        };
        let method = matched.method;
        debug!(
            method = method.name(),
            pattern = matched.pattern.as_str(),
            "Matched handler"
        );

        let args = self
            .bind(&matched, message)
            .map_err(|source| DispatchError::Resolution {
                method: method.name().to_string(),
                source,
            })?;

        let reply = method
            .invoke(args)
            .map_err(|e| DispatchError::from_invoke(method.name(), e))?;

        let Some(reply) = reply else {
            return Ok(Dispatched::Handled {
                method: method.name().to_string(),
            });
        };

        let Some(target) =
            self.reply_target(kind, method, &matched.variables, destination, lookup, headers)
        else {
            warn!(
                method = method.name(),
                "Subscription reply dropped: message has no session id"
            );
            return Ok(Dispatched::Handled {
                method: method.name().to_string(),
            });
        };

        let outbound = outbound_message(&target, reply, headers);
        debug!(reply_target = %target, "Forwarding reply");
        self.inner
            .sender
            .send(target.clone(), outbound)
            .map_err(|source| DispatchError::Send {
                method: method.name().to_string(),
                target: target.clone(),
                source,
            })?;

        Ok(Dispatched::Forwarded {
            method: method.name().to_string(),
            target,
        })
    }

    /// Resolves every parameter in declaration order into fresh storage.
    fn bind(&self, matched: &MatchResult<'_>, message: &Message) -> ResolveResult<Arguments> {
        let method = matched.method;
        let resolvers = self.inner.registry.resolvers();
        let mut args = Arguments::with_capacity(method.parameters().len());

        for (param, &slot) in method.parameters().iter().zip(&method.resolver_plan) {
            let resolver = resolvers
                .get(slot)
                .ok_or(ArgumentResolutionError::Unbound { index: param.index })?;
            let value = resolver.resolve(param, message, &matched.variables)?;
            trace!(
                parameter = %param.label(),
                resolver = resolver.name(),
                "Bound argument"
            );
            args.push(param.label(), value);
        }

        Ok(args)
    }

    fn reply_target(
        &self,
        kind: MappingKind,
        method: &HandlerMethod,
        variables: &PathVariables,
        destination: &str,
        lookup: &str,
        headers: &MessageHeaders,
    ) -> Option<SendTarget> {
        if let Some(send_to) = method.send_to() {
            return Some(SendTarget::Destination(expand_variables(send_to, variables)));
        }

        match kind {
            MappingKind::Message => Some(SendTarget::Destination(format!(
                "{}{lookup}",
                self.inner.options.broker_prefix
            ))),
            MappingKind::Subscribe => headers.session_id().map(|session_id| SendTarget::Session {
                session_id: session_id.to_string(),
                destination: destination.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.inner.registry.method_count())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Replaces `{name}` placeholders with matched path variables. Unknown
/// placeholders are left as written.
fn expand_variables(template: &str, variables: &PathVariables) -> String {
    if variables.is_empty() || !template.contains('{') {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn outbound_message(target: &SendTarget, reply: Reply, inbound: &MessageHeaders) -> Message {
    let mut builder = Message::builder()
        .message_type(MessageType::Message)
        .destination(target.destination())
        .payload(reply.payload);

    if let Some(session_id) = inbound.session_id() {
        builder = builder.session_id(session_id);
    }
    if let Some(subscription_id) = inbound.subscription_id() {
        builder = builder.subscription_id(subscription_id);
    }

    let mut message = builder.build();
    if let Some(content_type) = reply.content_type {
        message.headers_mut().set_content_type(content_type);
    }
    message
}
