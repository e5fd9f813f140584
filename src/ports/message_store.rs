//! Message store port - the durable, append-only message log.
//!
//! The store is the writer of record. Everything else that shows messages
//! (bus deliveries, optimistic timelines) is a cache derived from it.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::chat::{Message, NewMessage};
use crate::domain::foundation::{ConversationId, DomainError};

/// Append-only message log keyed by conversation.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append a message, assigning id, `created_at` and `sequence`.
    ///
    /// Idempotent on `(conversation_id, correlation_id)`: repeating a send
    /// with the same correlation id returns the originally stored message
    /// and writes nothing.
    ///
    /// `created_at` is monotonic per conversation and `sequence` strictly
    /// increasing, so commit order equals canonical order.
    async fn append(&self, message: NewMessage) -> Result<Message, DomainError>;

    /// All messages of a conversation ordered by `(created_at, sequence)`.
    async fn list(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, DomainError>;

    /// Message counts for several conversations in one call.
    ///
    /// Conversations without messages may be absent from the map.
    async fn count_by_conversation(
        &self,
        conversation_ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, u64>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_store_is_object_safe_and_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn MessageStore>();
    }
}
