//! Domain event plumbing shared by every publisher and subscriber.
//!
//! Events are plain serde structs that implement [`DomainEvent`] (usually via
//! [`domain_event!`]). Before they leave the producing handler they are
//! wrapped in an [`EventEnvelope`], which is what the event bus and the
//! realtime bridge route on.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::Timestamp;

/// Identity, routing key and time of a domain event.
pub trait DomainEvent: Send + Sync {
    /// Versioned routing key, `<context>.<name>.v<N>`.
    fn event_type(&self) -> &'static str;

    /// Id of the aggregate the event belongs to.
    fn aggregate_id(&self) -> String;

    fn aggregate_type(&self) -> &'static str;

    fn occurred_at(&self) -> Timestamp;

    fn event_id(&self) -> EventId;
}

/// Wraps any serializable [`DomainEvent`] into an envelope.
pub trait SerializableDomainEvent: DomainEvent + Serialize {
    fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        let payload = serde_json::to_value(self)?;
        let mut envelope = EventEnvelope::new(
            self.event_type(),
            self.aggregate_id(),
            self.aggregate_type(),
            payload,
        );
        envelope.event_id = self.event_id();
        envelope.occurred_at = self.occurred_at();
        Ok(envelope)
    }
}

impl<T: DomainEvent + Serialize> SerializableDomainEvent for T {}

/// Implements [`DomainEvent`] from a struct's fields.
///
/// ```ignore
/// domain_event!(
///     MessageInserted,
///     event_type = MESSAGE_INSERTED,
///     aggregate_id = conversation_id,
///     aggregate_type = "Conversation",
///     occurred_at = inserted_at,
///     event_id = event_id
/// );
/// ```
#[macro_export]
macro_rules! domain_event {
    (
        $event:ident,
        event_type = $event_type:expr,
        aggregate_id = $aggregate_id:ident,
        aggregate_type = $aggregate_type:expr,
        occurred_at = $occurred_at:ident,
        event_id = $event_id:ident
    ) => {
        impl $crate::domain::foundation::DomainEvent for $event {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn aggregate_id(&self) -> String {
                self.$aggregate_id.to_string()
            }

            fn aggregate_type(&self) -> &'static str {
                $aggregate_type
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_at
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id
            }
        }
    };
}

/// Per-instance event id. Subscribers may use it to drop redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Request context carried alongside the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Client correlation id of the send that produced the event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Acting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// What travels over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub event_type: String,
    /// Parsed from the `.vN` suffix of `event_type`.
    pub schema_version: u32,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub occurred_at: Timestamp,
    pub payload: JsonValue,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        Self {
            event_id: EventId::new(),
            schema_version: schema_version(&event_type),
            event_type,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at: Timestamp::now(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.user_id = Some(id.into());
        self
    }

    /// Decode the payload back into its event struct.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// `"chat.message_inserted.v2"` is version 2; no suffix means version 1.
fn schema_version(event_type: &str) -> u32 {
    match event_type.rsplit_once(".v") {
        Some((_, version)) => version.parse().unwrap_or(1),
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_version_comes_from_suffix() {
        assert_eq!(schema_version("chat.message_inserted.v2"), 2);
        assert_eq!(schema_version("chat.message_inserted"), 1);
        assert_eq!(schema_version("chat.bad.vX"), 1);
    }

    #[test]
    fn metadata_omits_absent_fields() {
        let meta = EventMetadata {
            correlation_id: Some("c-1".to_string()),
            user_id: None,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["correlation_id"], "c-1");
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn envelope_records_sender_and_correlation() {
        let envelope = EventEnvelope::new("chat.test.v1", "conv-1", "Conversation", json!({}))
            .with_correlation_id("c-1")
            .with_user_id("B1");

        assert_eq!(envelope.schema_version, 1);
        assert_eq!(envelope.metadata.correlation_id.as_deref(), Some("c-1"));
        assert_eq!(envelope.metadata.user_id.as_deref(), Some("B1"));
    }

    #[test]
    fn envelope_without_metadata_deserializes() {
        let raw = json!({
            "event_id": EventId::new(),
            "event_type": "chat.test.v1",
            "schema_version": 1,
            "aggregate_id": "conv-1",
            "aggregate_type": "Conversation",
            "occurred_at": Timestamp::now(),
            "payload": {"n": 7}
        });

        let envelope: EventEnvelope = serde_json::from_value(raw).unwrap();

        #[derive(Deserialize)]
        struct Payload {
            n: u32,
        }
        let payload: Payload = envelope.payload_as().unwrap();
        assert_eq!(payload.n, 7);
        assert_eq!(envelope.metadata, EventMetadata::default());
    }
}
