//! Message model shared by every Waypoint layer.
//!
//! A [`Message`] is a header map plus an opaque byte [`Payload`]. The
//! dispatcher only relies on a handful of well-known headers (message type,
//! destination, session and subscription ids); everything else is carried
//! through untouched and made available to handlers.
//!
//! # Example
//!
//! ```rust
//! use waypoint_core::{Message, MessageType};
//!
//! let message = Message::builder()
//!     .message_type(MessageType::Subscribe)
//!     .destination("/sub/bar/value")
//!     .session_id("sess-1")
//!     .header("foo", "bar")
//!     .build();
//!
//! assert_eq!(message.headers().destination(), Some("/sub/bar/value"));
//! assert_eq!(message.headers().message_type(), MessageType::Subscribe);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying the [`MessageType`] discriminator.
pub const MESSAGE_TYPE_HEADER: &str = "simpMessageType";
/// Header carrying the routing destination.
pub const DESTINATION_HEADER: &str = "simpDestination";
/// Header carrying the id of the session the message arrived on.
pub const SESSION_ID_HEADER: &str = "simpSessionId";
/// Header carrying the subscription id of a SUBSCRIBE frame.
pub const SUBSCRIPTION_ID_HEADER: &str = "simpSubscriptionId";
/// Header describing the payload encoding.
pub const CONTENT_TYPE_HEADER: &str = "contentType";

// =============================================================================
// MessageType
// =============================================================================

/// Classifies inbound messages into independent routing namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// A plain application message.
    #[default]
    Message,
    /// A subscription request.
    Subscribe,
    /// A subscription cancellation.
    Unsubscribe,
    /// A session opening handshake.
    Connect,
    /// A session close.
    Disconnect,
    /// A keep-alive frame.
    Heartbeat,
    /// Anything else.
    Other,
}

impl MessageType {
    /// Returns the wire name of this message type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Heartbeat => "HEARTBEAT",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = std::convert::Infallible;

    /// Parses a wire name, case-insensitively. Unknown names map to [`MessageType::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "MESSAGE" => Self::Message,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "CONNECT" => Self::Connect,
            "DISCONNECT" => Self::Disconnect,
            "HEARTBEAT" => Self::Heartbeat,
            _ => Self::Other,
        })
    }
}

// =============================================================================
// MessageHeaders
// =============================================================================

/// The header map of a [`Message`].
///
/// Values are JSON values so numeric and boolean headers survive without
/// string round-trips. Keys are kept sorted, which keeps `Debug` output and
/// iteration order stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHeaders {
    entries: BTreeMap<String, Value>,
}

impl MessageHeaders {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value of a header.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Returns a header value if it is a JSON string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(Value::as_str)
    }

    /// Inserts a header, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(name.into(), value.into())
    }

    /// Removes a header.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all headers in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns a read-only view of the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    // ─── Well-known headers ──────────────────────────────────────────────────

    /// Returns the message type, defaulting to [`MessageType::Message`] when absent.
    pub fn message_type(&self) -> MessageType {
        match self.entries.get(MESSAGE_TYPE_HEADER) {
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            Some(_) => MessageType::Other,
            None => MessageType::Message,
        }
    }

    pub fn set_message_type(&mut self, message_type: MessageType) {
        self.insert(MESSAGE_TYPE_HEADER, message_type.as_str());
    }

    /// Returns the routing destination, if any.
    pub fn destination(&self) -> Option<&str> {
        self.get_str(DESTINATION_HEADER)
    }

    pub fn set_destination(&mut self, destination: impl Into<String>) {
        self.insert(DESTINATION_HEADER, destination.into());
    }

    pub fn session_id(&self) -> Option<&str> {
        self.get_str(SESSION_ID_HEADER)
    }

    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.insert(SESSION_ID_HEADER, session_id.into());
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.get_str(SUBSCRIPTION_ID_HEADER)
    }

    pub fn set_subscription_id(&mut self, subscription_id: impl Into<String>) {
        self.insert(SUBSCRIPTION_ID_HEADER, subscription_id.into());
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_str(CONTENT_TYPE_HEADER)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.insert(CONTENT_TYPE_HEADER, content_type.into());
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MessageHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

/// The body of a [`Message`].
///
/// Backed by [`Bytes`], so cloning a payload never copies the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload(Bytes);

impl Payload {
    /// Creates an empty payload.
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the payload as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Returns a cheap clone of the underlying buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(Bytes::from(text))
    }
}

impl From<&'static str> for Payload {
    fn from(text: &'static str) -> Self {
        Self(Bytes::from_static(text.as_bytes()))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

// =============================================================================
// Message
// =============================================================================

/// An inbound or outbound message: headers plus payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    headers: MessageHeaders,
    payload: Payload,
}

impl Message {
    /// Creates a message from parts.
    pub fn new(headers: MessageHeaders, payload: impl Into<Payload>) -> Self {
        Self {
            headers,
            payload: payload.into(),
        }
    }

    /// Starts building a message.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut MessageHeaders {
        &mut self.headers
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Splits the message into its parts.
    pub fn into_parts(self) -> (MessageHeaders, Payload) {
        (self.headers, self.payload)
    }
}

/// Builder for [`Message`].
#[derive(Debug, Default)]
pub struct MessageBuilder {
    headers: MessageHeaders,
    payload: Payload,
}

impl MessageBuilder {
    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.headers.set_message_type(message_type);
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.headers.set_destination(destination);
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.headers.set_session_id(session_id);
        self
    }

    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.headers.set_subscription_id(subscription_id);
        self
    }

    /// Adds an arbitrary header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Copies every header from `headers`, overwriting existing keys.
    pub fn copy_headers(mut self, headers: &MessageHeaders) -> Self {
        for (name, value) in headers.iter() {
            self.headers.insert(name, value.clone());
        }
        self
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn build(self) -> Message {
        Message {
            headers: self.headers,
            payload: self.payload,
        }
    }
}
