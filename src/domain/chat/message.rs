//! Chat message value types.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ConversationId, CorrelationId, MessageId, Timestamp, UserId, ValidationError,
};

/// Validated message text: trimmed, non-empty, bounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    /// Maximum number of characters accepted in one message.
    pub const MAX_CHARS: usize = 4000;

    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("content"));
        }
        let chars = trimmed.chars().count();
        if chars > Self::MAX_CHARS {
            return Err(ValidationError::too_long("content", Self::MAX_CHARS, chars));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageContent> for String {
    fn from(content: MessageContent) -> Self {
        content.0
    }
}

impl std::fmt::Display for MessageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A durably persisted chat message. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: MessageContent,
    /// Server-assigned commit time.
    pub created_at: Timestamp,
    /// Store-assigned insertion number; breaks ties between equal timestamps.
    pub sequence: i64,
    /// Echo of the client correlation id supplied with the send, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl Message {
    /// Total order used for display and listing: `(created_at, sequence)`.
    pub fn canonical_cmp(&self, other: &Message) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Sorts messages into canonical order in place.
pub fn sort_canonical(messages: &mut [Message]) {
    messages.sort_by(Message::canonical_cmp);
}

/// An append request for the message store.
///
/// The store assigns `id`, `created_at` and `sequence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub correlation_id: Option<CorrelationId>,
}
