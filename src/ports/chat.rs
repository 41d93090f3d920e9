//! Chat transport boundary
//!
//! The core never talks to a messaging platform directly; it sends prompts
//! and deletes its own UI artifacts through this port. No wire format is
//! implied. Message ids are whatever the transport hands back and are only
//! ever echoed back to it.

use async_trait::async_trait;
use thiserror::Error;

/// External user identity as delivered by the transport.
pub type UserId = u64;

/// Transport-assigned id of a delivered message.
pub type MessageId = i64;

/// Inline button attached to a prompt. `action` is the opaque token the
/// transport returns when the button is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("transport fault: {0}")]
    Network(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

impl ChatError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChatError::Network(_))
    }
}

/// Outbound half of the chat transport.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Deliver a message, optionally with button rows, and return its id.
    async fn send_message(
        &self,
        user: UserId,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> Result<MessageId, ChatError>;

    /// Remove a previously sent message. Callers treat failures as
    /// best-effort cleanup losses, not fatal errors.
    async fn delete_message(&self, user: UserId, message: MessageId) -> Result<(), ChatError>;
}
