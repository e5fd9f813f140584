//! Bridge from domain events to realtime channels.
//!
//! ```text
//! SendMessageHandler ── chat.message_inserted.v1 ──▶ EventBus
//!                                                      │
//!                                           RealtimeEventBridge
//!                                                      │
//!                                   RealtimeTransport::publish("chat:<id>")
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::chat::{MessageInserted, MESSAGE_INSERTED};
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{channel_for, EventHandler, EventSubscriber, RealtimeTransport};

/// Forwards committed messages to the conversation's transport channel.
pub struct RealtimeEventBridge {
    transport: Arc<dyn RealtimeTransport>,
}

impl RealtimeEventBridge {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self { transport }
    }

    pub fn new_shared(transport: Arc<dyn RealtimeTransport>) -> Arc<Self> {
        Arc::new(Self::new(transport))
    }

    /// Register with an event subscriber for `chat.message_inserted.v1`.
    pub fn register(self: &Arc<Self>, subscriber: &dyn EventSubscriber) {
        subscriber.subscribe(MESSAGE_INSERTED, self.clone());
    }
}

#[async_trait]
impl EventHandler for RealtimeEventBridge {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if event.event_type != MESSAGE_INSERTED {
            return Ok(());
        }

        let inserted: MessageInserted = event.payload_as().map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Malformed {} payload: {}", MESSAGE_INSERTED, e),
            )
        })?;

        let channel = channel_for(&inserted.conversation_id);
        self.transport.publish(&channel, &inserted).await?;
        tracing::debug!(
            channel = %channel,
            message_id = %inserted.message.id,
            "Forwarded message to realtime channel"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RealtimeEventBridge"
    }
}
