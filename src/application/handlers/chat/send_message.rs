//! SendMessageHandler - durable append followed by a delivery event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::chat::{ChatError, Message, MessageContent, MessageInserted, NewMessage};
use crate::domain::foundation::{
    ConversationId, CorrelationId, SerializableDomainEvent, UserId,
};
use crate::ports::{ConversationRepository, EventPublisher, MessageStore};

/// Command to append one message to a conversation.
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    /// Raw composer text; trimmed and validated here.
    pub content: String,
    /// Client-generated key echoed on the stored message. Replays with the
    /// same key return the originally stored message.
    pub correlation_id: Option<CorrelationId>,
}

/// Per-conversation lock held from append until the delivery event is
/// published, so events for one conversation leave this process in commit
/// order. Entries are dropped once no send holds them.
#[derive(Default)]
struct CommitOrder {
    locks: Mutex<HashMap<ConversationId, Weak<AsyncMutex<()>>>>,
}

impl CommitOrder {
    async fn acquire(&self, conversation_id: ConversationId) -> OwnedMutexGuard<()> {
        self.lock_for(conversation_id).lock_owned().await
    }

    fn lock_for(&self, conversation_id: ConversationId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(&conversation_id).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(conversation_id, Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }
}

/// Handler for sending messages.
///
/// Never retries. A publish failure after a successful append is logged and
/// the stored message is still returned.
pub struct SendMessageHandler {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageStore>,
    event_publisher: Arc<dyn EventPublisher>,
    commit_order: CommitOrder,
}

impl SendMessageHandler {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageStore>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            conversations,
            messages,
            event_publisher,
            commit_order: CommitOrder::default(),
        }
    }

    pub async fn handle(&self, cmd: SendMessageCommand) -> Result<Message, ChatError> {
        let content = MessageContent::new(&cmd.content)?;

        let conversation = self
            .conversations
            .find_by_id(&cmd.conversation_id)
            .await
            .map_err(|e| ChatError::send_failed(e.message))?
            .ok_or(ChatError::ConversationNotFound(cmd.conversation_id))?;

        if !conversation.involves(&cmd.sender_id) {
            return Err(ChatError::Forbidden);
        }

        let _ordered = self.commit_order.acquire(cmd.conversation_id).await;

        let message = self
            .messages
            .append(NewMessage {
                conversation_id: cmd.conversation_id,
                sender_id: cmd.sender_id,
                content,
                correlation_id: cmd.correlation_id,
            })
            .await
            .map_err(|e| {
                tracing::warn!(conversation_id = %cmd.conversation_id, error = %e, "message append failed");
                ChatError::send_failed(e.message)
            })?;

        self.publish_inserted(&message).await;

        Ok(message)
    }

    async fn publish_inserted(&self, message: &Message) {
        let mut envelope = match MessageInserted::new(message.clone()).to_envelope() {
            Ok(envelope) => envelope.with_user_id(message.sender_id.as_str()),
            Err(error) => {
                tracing::error!(message_id = %message.id, %error, "failed to encode message event");
                return;
            }
        };
        if let Some(correlation_id) = message.correlation_id {
            envelope = envelope.with_correlation_id(correlation_id.to_string());
        }

        if let Err(error) = self.event_publisher.publish(envelope).await {
            tracing::warn!(
                message_id = %message.id,
                conversation_id = %message.conversation_id,
                %error,
                "message stored but delivery event not published"
            );
        }
    }
}
