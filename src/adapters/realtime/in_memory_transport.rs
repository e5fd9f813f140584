//! Single-process transport over tokio broadcast channels.
//!
//! One broadcast channel per conversation channel name. A receiver that falls
//! more than `capacity` events behind is lagged; its stream reports `Dropped`
//! and ends, and the delivery bus turns that into a degraded subscription.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};

use crate::domain::chat::MessageInserted;
use crate::domain::foundation::DomainError;
use crate::ports::{RealtimeTransport, TransportSignal, TransportStream};

/// Default per-channel buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// In-process pub/sub transport.
pub struct InMemoryTransport {
    channels: RwLock<HashMap<String, broadcast::Sender<MessageInserted>>>,
    capacity: usize,
}

impl InMemoryTransport {
    /// Create a transport whose channels buffer `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of open streams on a channel.
    pub async fn receiver_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Tear a channel down as if its connection were lost.
    ///
    /// Every open stream reports `Dropped` and ends.
    pub async fn disconnect(&self, channel: &str) {
        self.channels.write().await.remove(channel);
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl RealtimeTransport for InMemoryTransport {
    async fn publish(&self, channel: &str, event: &MessageInserted) -> Result<(), DomainError> {
        let idle = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(sender) => sender.send(event.clone()).is_err(),
                None => false,
            }
        };

        if idle {
            let mut channels = self.channels.write().await;
            if channels
                .get(channel)
                .is_some_and(|s| s.receiver_count() == 0)
            {
                channels.remove(channel);
            }
        }
        Ok(())
    }

    async fn open(&self, channel: &str) -> Result<TransportStream, DomainError> {
        let receiver = {
            let mut channels = self.channels.write().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let signals = stream::unfold(Some(receiver), |state| async move {
            let mut receiver = state?;
            match receiver.recv().await {
                Ok(event) => Some((TransportSignal::Event(event), Some(receiver))),
                Err(RecvError::Lagged(missed)) => Some((
                    TransportSignal::Dropped {
                        reason: format!("subscriber lagged by {} events", missed),
                    },
                    None,
                )),
                Err(RecvError::Closed) => Some((
                    TransportSignal::Dropped {
                        reason: "channel closed".to_string(),
                    },
                    None,
                )),
            }
        });

        Ok(Box::pin(signals))
    }
}
