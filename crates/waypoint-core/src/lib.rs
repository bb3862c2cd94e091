//! # Waypoint Core
//!
//! Shared vocabulary for the Waypoint destination-dispatch framework.
//!
//! This crate defines the two seams the dispatcher talks through:
//!
//! - **Inbound**: the [`Message`] value (headers plus [`Payload`]) handed to
//!   the dispatcher, with accessors for the well-known routing headers.
//! - **Outbound**: the [`MessageSendingOperations`] trait the dispatcher
//!   calls to forward handler return values, addressed by [`SendTarget`].
//!
//! Two reference senders are provided: [`ChannelSendingOperations`], which
//! pushes onto a tokio channel, and [`InMemorySendingOperations`], which
//! records everything for inspection in tests.

pub mod error;
pub mod message;
pub mod sending;

pub use error::{SendError, SendResult};
pub use message::{
    CONTENT_TYPE_HEADER, DESTINATION_HEADER, MESSAGE_TYPE_HEADER, Message, MessageBuilder,
    MessageHeaders, MessageType, Payload, SESSION_ID_HEADER, SUBSCRIPTION_ID_HEADER,
};
pub use sending::{
    BoxedSender, ChannelSendingOperations, InMemorySendingOperations, MessageSendingOperations,
    OutboundMessage, SendTarget,
};
