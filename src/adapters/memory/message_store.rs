//! In-memory message store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::chat::{Message, NewMessage};
use crate::domain::foundation::{
    ConversationId, CorrelationId, DomainError, MessageId, Timestamp,
};
use crate::ports::MessageStore;

#[derive(Debug, Default)]
struct Log {
    by_conversation: HashMap<ConversationId, Vec<Message>>,
    by_correlation: HashMap<(ConversationId, CorrelationId), MessageId>,
    last_sequence: i64,
}

/// Append-only log held in memory.
///
/// Appends take one write lock, so sequence numbers and per-conversation
/// timestamps are assigned in commit order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    log: Arc<RwLock<Log>>,
    fail_appends: Arc<AtomicBool>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent append fail with a database error.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Total number of stored messages.
    pub async fn len(&self) -> usize {
        self.log
            .read()
            .await
            .by_conversation
            .values()
            .map(Vec::len)
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, new: NewMessage) -> Result<Message, DomainError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(DomainError::database("message store unavailable"));
        }

        let mut log = self.log.write().await;

        if let Some(correlation_id) = new.correlation_id {
            let existing = log
                .by_correlation
                .get(&(new.conversation_id, correlation_id))
                .copied();
            if let Some(id) = existing {
                let stored = log
                    .by_conversation
                    .get(&new.conversation_id)
                    .and_then(|messages| messages.iter().find(|m| m.id == id));
                if let Some(stored) = stored {
                    return Ok(stored.clone());
                }
            }
        }

        log.last_sequence += 1;
        let sequence = log.last_sequence;
        let messages = log.by_conversation.entry(new.conversation_id).or_default();
        let now = Timestamp::now();
        let created_at = match messages.last() {
            Some(last) if !now.is_after(&last.created_at) => last.created_at,
            _ => now,
        };

        let message = Message {
            id: MessageId::new(),
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            content: new.content,
            created_at,
            sequence,
            correlation_id: new.correlation_id,
        };
        messages.push(message.clone());
        if let Some(correlation_id) = new.correlation_id {
            log.by_correlation
                .insert((new.conversation_id, correlation_id), message.id);
        }
        Ok(message)
    }

    async fn list(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, DomainError> {
        Ok(self
            .log
            .read()
            .await
            .by_conversation
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_by_conversation(
        &self,
        conversation_ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, u64>, DomainError> {
        let log = self.log.read().await;
        Ok(conversation_ids
            .iter()
            .filter_map(|id| {
                log.by_conversation
                    .get(id)
                    .map(|messages| (*id, messages.len() as u64))
            })
            .collect())
    }
}
