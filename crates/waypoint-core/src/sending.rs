//! Outbound sending contract.
//!
//! The dispatcher never talks to a transport directly. When a handler
//! returns a value, the dispatcher wraps it in a [`Message`] and hands it to
//! a [`MessageSendingOperations`] implementation together with a
//! [`SendTarget`] describing where it should go.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{SendError, SendResult};
use crate::message::Message;

/// Where an outbound message should be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SendTarget {
    /// Broadcast to every subscriber of a broker destination.
    Destination(String),
    /// Deliver to a single session only.
    Session {
        /// The receiving session.
        session_id: String,
        /// The destination the reply is addressed to.
        destination: String,
    },
}

impl SendTarget {
    /// Returns the destination part of the target.
    pub fn destination(&self) -> &str {
        match self {
            Self::Destination(destination) => destination,
            Self::Session { destination, .. } => destination,
        }
    }

    /// Returns the session id for session-addressed targets.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Destination(_) => None,
            Self::Session { session_id, .. } => Some(session_id),
        }
    }
}

impl fmt::Display for SendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destination(destination) => f.write_str(destination),
            Self::Session {
                session_id,
                destination,
            } => write!(f, "{destination} (session {session_id})"),
        }
    }
}

/// The outbound collaborator the dispatcher forwards replies to.
///
/// Implementations must not block: the dispatcher calls `send` on the thread
/// that is handling the inbound message.
pub trait MessageSendingOperations: Send + Sync {
    /// Sends `message` to `target`.
    fn send(&self, target: SendTarget, message: Message) -> SendResult<()>;
}

/// A shared, type-erased sender.
pub type BoxedSender = Arc<dyn MessageSendingOperations>;

impl<T: MessageSendingOperations + ?Sized> MessageSendingOperations for Arc<T> {
    fn send(&self, target: SendTarget, message: Message) -> SendResult<()> {
        (**self).send(target, message)
    }
}

/// A message together with the target it was sent to.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub target: SendTarget,
    pub message: Message,
}

// =============================================================================
// ChannelSendingOperations
// =============================================================================

/// Pushes outbound messages onto an unbounded tokio channel.
///
/// The receiving half is typically owned by whatever writes to the broker
/// or to client sessions.
#[derive(Debug, Clone)]
pub struct ChannelSendingOperations {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSendingOperations {
    /// Creates a sender and the matching receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wraps an existing channel sender.
    pub fn new(tx: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self { tx }
    }
}

impl MessageSendingOperations for ChannelSendingOperations {
    fn send(&self, target: SendTarget, message: Message) -> SendResult<()> {
        trace!(send_target = %target, "Queueing outbound message");
        self.tx
            .send(OutboundMessage { target, message })
            .map_err(|_| SendError::ChannelClosed)
    }
}

// =============================================================================
// InMemorySendingOperations
// =============================================================================

/// Records every outbound message in memory.
#[derive(Debug, Default)]
pub struct InMemorySendingOperations {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl InMemorySendingOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything sent so far.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    /// Drains and returns everything sent so far.
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl MessageSendingOperations for InMemorySendingOperations {
    fn send(&self, target: SendTarget, message: Message) -> SendResult<()> {
        self.sent.lock().push(OutboundMessage { target, message });
        Ok(())
    }
}
