//! Realtime delivery adapters.
//!
//! - `InMemoryTransport` - tokio broadcast channels, single process
//! - `RedisTransport` - Redis PUBLISH/SUBSCRIBE, multi-server
//! - `SubscriptionManager` - Reference-counted `DeliveryBus` over a transport
//! - `RealtimeEventBridge` - Forwards `chat.message_inserted.v1` to the transport

mod event_bridge;
mod in_memory_transport;
mod redis_transport;
mod subscription_manager;

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

pub use event_bridge::RealtimeEventBridge;
pub use in_memory_transport::{InMemoryTransport, DEFAULT_CHANNEL_CAPACITY};
pub use redis_transport::RedisTransport;
pub use subscription_manager::SubscriptionManager;

/// Transport-level failures, translated to `DomainError` at the port.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<TransportError> for DomainError {
    fn from(err: TransportError) -> Self {
        DomainError::new(ErrorCode::TransportError, err.to_string())
    }
}
