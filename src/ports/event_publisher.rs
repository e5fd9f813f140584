//! EventPublisher port - Interface for publishing domain events.
//!
//! The send and resolve flows publish through this port without knowing
//! whether events stay in-process or travel further.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// A returned error means at least one subscriber failed; the event itself
/// has still been offered to every subscriber.
///
/// ```ignore
/// let envelope = MessageInserted::new(message).to_envelope()?;
/// publisher.publish(envelope).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;
}
