//! Delivery bus port - push notifications of new messages per conversation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::chat::{ChatError, Message};
use crate::domain::foundation::ConversationId;

/// What a subscriber is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// A message committed to the subscribed conversation.
    Message(Message),
    /// The subscription stopped; events may have been missed.
    ///
    /// The handle is inert afterwards. Re-subscribe, then re-fetch history.
    Degraded { reason: String },
}

/// Receives events for one subscription.
///
/// Called from the bus's delivery task, one event at a time. Implementations
/// must return quickly and must not call `unsubscribe` from inside `on_event`.
pub trait DeliveryListener: Send + Sync {
    fn on_event(&self, event: DeliveryEvent);
}

/// Identifies one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    conversation_id: ConversationId,
    subscriber_id: u64,
}

impl SubscriptionHandle {
    pub fn new(conversation_id: ConversationId, subscriber_id: u64) -> Self {
        Self {
            conversation_id,
            subscriber_id,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn subscriber_id(&self) -> u64 {
        self.subscriber_id
    }
}

/// Per-conversation subscription registry.
///
/// Within one conversation a subscriber observes commit order. Nothing is
/// promised across conversations.
#[async_trait]
pub trait DeliveryBus: Send + Sync {
    /// Start receiving events for `conversation_id`.
    ///
    /// # Errors
    ///
    /// - `SubscriptionDegraded` if the channel could not be opened
    async fn subscribe(
        &self,
        conversation_id: ConversationId,
        listener: Arc<dyn DeliveryListener>,
    ) -> Result<SubscriptionHandle, ChatError>;

    /// Stop a subscription. Idempotent; inert handles are ignored.
    ///
    /// Once this returns the listener is never invoked again.
    fn unsubscribe(&self, handle: &SubscriptionHandle);
}
