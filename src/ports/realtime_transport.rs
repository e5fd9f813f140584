//! Realtime transport port - per-conversation pub/sub channels.
//!
//! A transport moves `MessageInserted` payloads between server processes.
//! Channels are named `chat:<conversation_id>`. Delivery is at-least-once and
//! ordered per channel; consumers deduplicate by message id.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::chat::MessageInserted;
use crate::domain::foundation::{ConversationId, DomainError};

/// Prefix of every chat channel name.
pub const CHANNEL_PREFIX: &str = "chat:";

/// Transport channel name for a conversation.
pub fn channel_for(conversation_id: &ConversationId) -> String {
    format!("{}{}", CHANNEL_PREFIX, conversation_id)
}

/// Something observed on an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// A message was committed to the channel's conversation.
    Event(MessageInserted),
    /// The channel lost events or its connection. Nothing further follows.
    Dropped { reason: String },
}

/// Stream of signals for one open channel. Dropping it closes the channel.
pub type TransportStream = Pin<Box<dyn Stream<Item = TransportSignal> + Send>>;

/// Pub/sub port used by the delivery bus and the event bridge.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Publish an event to every open stream of `channel`.
    async fn publish(&self, channel: &str, event: &MessageInserted) -> Result<(), DomainError>;

    /// Open a stream of signals for `channel`.
    ///
    /// Only events published after `open` returns are observed.
    async fn open(&self, channel: &str) -> Result<TransportStream, DomainError>;
}
