//! Redis pub/sub transport for multi-server deployments.
//!
//! Publishes JSON-encoded `MessageInserted` payloads with PUBLISH over a shared
//! multiplexed connection. Each opened channel holds its own SUBSCRIBE
//! connection; when that connection ends the stream reports `Dropped`.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::chat::MessageInserted;
use crate::domain::foundation::DomainError;
use crate::ports::{RealtimeTransport, TransportSignal, TransportStream};

use super::TransportError;

/// Redis-backed realtime transport.
#[derive(Clone)]
pub struct RedisTransport {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisTransport {
    /// Connect the publishing side. Subscriptions connect lazily per channel.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let client = redis::Client::open(url)?;
        let publisher = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { client, publisher })
    }

    fn decode(channel: &str, msg: redis::Msg) -> Option<TransportSignal> {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(channel, error = %e, "Non-text payload on chat channel");
                return None;
            }
        };
        match serde_json::from_str::<MessageInserted>(&payload) {
            Ok(event) => Some(TransportSignal::Event(event)),
            Err(e) => {
                tracing::warn!(channel, error = %e, "Undecodable payload on chat channel");
                None
            }
        }
    }
}

#[async_trait]
impl RealtimeTransport for RedisTransport {
    async fn publish(&self, channel: &str, event: &MessageInserted) -> Result<(), DomainError> {
        let payload = serde_json::to_string(event).map_err(TransportError::from)?;
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(TransportError::from)?;
        tracing::trace!(channel, receivers, "Published chat event");
        Ok(())
    }

    async fn open(&self, channel: &str) -> Result<TransportStream, DomainError> {
        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(TransportError::from)?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(channel)
            .await
            .map_err(TransportError::from)?;

        let name = channel.to_string();
        let events = pubsub
            .into_on_message()
            .filter_map(move |msg| {
                let signal = Self::decode(&name, msg);
                async move { signal }
            });
        let ended = stream::once(async {
            TransportSignal::Dropped {
                reason: "redis subscription ended".to_string(),
            }
        });

        Ok(Box::pin(events.chain(ended)))
    }
}
