//! In-process event bus.
//!
//! Handlers run inline on the publishing task, in subscription order, so by
//! the time `publish` returns every subscriber has seen the event. A
//! single-node deployment routes `chat.message_inserted.v1` through it to the
//! realtime bridge.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

type HandlerMap = HashMap<String, Vec<Arc<dyn EventHandler>>>;

#[derive(Default)]
pub struct InMemoryEventBus {
    handlers: RwLock<HandlerMap>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers registered for `event_type`.
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    /// Runs every handler even if one fails; failures are reported together.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let mut failed = Vec::new();
        for handler in self.handlers_for(&event.event_type) {
            if let Err(e) = handler.handle(event.clone()).await {
                tracing::warn!(
                    handler = handler.name(),
                    event_type = %event.event_type,
                    event_id = %event.event_id,
                    error = %e,
                    "Event handler failed"
                );
                failed.push(format!("{}: {}", handler.name(), e));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Handler errors: {}", failed.join(", ")),
            ))
        }
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, "c-1", "Conversation", json!({}))
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn name(&self) -> &'static str {
            "CountingHandler"
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            Err(DomainError::new(ErrorCode::TransportError, "channel down"))
        }
        fn name(&self) -> &'static str {
            "FailingHandler"
        }
    }

    #[tokio::test]
    async fn dispatches_only_to_matching_type() {
        let bus = InMemoryEventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe("chat.message_inserted.v1", Arc::new(CountingHandler(counter.clone())));

        bus.publish(envelope("chat.message_inserted.v1")).await.unwrap();
        bus.publish(envelope("chat.conversation_started.v1")).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count("chat.message_inserted.v1"), 1);
        assert_eq!(bus.handler_count("chat.conversation_started.v1"), 0);
    }

    #[tokio::test]
    async fn publish_without_handlers_succeeds() {
        let bus = InMemoryEventBus::new();
        assert!(bus.publish(envelope("chat.unknown.v1")).await.is_ok());
    }

    #[tokio::test]
    async fn failure_is_reported_after_all_handlers_ran() {
        let bus = InMemoryEventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe("test.event", Arc::new(FailingHandler));
        bus.subscribe("test.event", Arc::new(CountingHandler(counter.clone())));

        let result = bus.publish(envelope("test.event")).await;

        assert!(result.unwrap_err().message.contains("FailingHandler"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
