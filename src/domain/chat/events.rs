//! Chat domain events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConversationId, EventId, ProductId, Timestamp, UserId};
use crate::domain_event;

use super::Message;

/// Event type emitted after a message is durably appended.
pub const MESSAGE_INSERTED: &str = "chat.message_inserted.v1";

/// Event type emitted when the resolver creates a conversation.
pub const CONVERSATION_STARTED: &str = "chat.conversation_started.v1";

/// A message was committed to the message store.
///
/// Carries the full canonical message so subscribers never need a read-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInserted {
    pub event_id: EventId,
    pub conversation_id: ConversationId,
    pub message: Message,
    pub inserted_at: Timestamp,
}

impl MessageInserted {
    pub fn new(message: Message) -> Self {
        Self {
            event_id: EventId::new(),
            conversation_id: message.conversation_id,
            inserted_at: message.created_at,
            message,
        }
    }
}

domain_event!(
    MessageInserted,
    event_type = MESSAGE_INSERTED,
    aggregate_id = conversation_id,
    aggregate_type = "Conversation",
    occurred_at = inserted_at,
    event_id = event_id
);

/// A conversation row was created for a new (product, buyer, seller) triple.
///
/// Nothing in this service consumes it. It is published for handlers outside
/// the chat core, such as seller notifications, to register against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStarted {
    pub event_id: EventId,
    pub conversation_id: ConversationId,
    pub product_id: ProductId,
    pub client_id: UserId,
    pub seller_id: UserId,
    pub started_at: Timestamp,
}

domain_event!(
    ConversationStarted,
    event_type = CONVERSATION_STARTED,
    aggregate_id = conversation_id,
    aggregate_type = "Conversation",
    occurred_at = started_at,
    event_id = event_id
);
