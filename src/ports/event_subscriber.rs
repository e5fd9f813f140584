//! EventSubscriber port - Registering handlers for domain events.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Reacts to one kind of domain event.
///
/// The same envelope may arrive twice; handlers must tolerate that.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Used in logs.
    fn name(&self) -> &'static str;
}

pub trait EventSubscriber: Send + Sync {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ports_are_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn EventHandler>();
        assert_send_sync::<dyn EventSubscriber>();
        assert_send_sync::<dyn super::super::EventPublisher>();
    }
}
