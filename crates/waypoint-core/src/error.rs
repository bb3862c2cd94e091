//! Error types for the Waypoint core.

use thiserror::Error;

/// Errors raised by a [`MessageSendingOperations`](crate::MessageSendingOperations)
/// implementation.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The outbound channel has been closed.
    #[error("outbound channel closed")]
    ChannelClosed,

    /// The sender refused the message.
    #[error("message to '{target}' rejected: {reason}")]
    Rejected {
        /// The target the message was addressed to.
        target: String,
        /// Why it was refused.
        reason: String,
    },
}

impl SendError {
    /// Creates a rejection error.
    pub fn rejected(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for send operations.
pub type SendResult<T> = Result<T, SendError>;
