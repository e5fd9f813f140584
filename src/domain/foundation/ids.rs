//! Strongly-typed identifiers.
//!
//! Ids this service mints are UUIDs. Ids owned by the identity service and
//! the product catalog are opaque non-blank strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

macro_rules! external_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Rejects blank ids.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(id: String) -> Result<Self, Self::Error> {
                Self::new(id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

uuid_id!(
    /// A buyer/seller conversation about one product. Minted on first resolve.
    ConversationId
);

uuid_id!(
    /// A persisted chat message.
    MessageId
);

uuid_id!(
    /// Client-generated tag on a send request. The store echoes it back on
    /// the persisted message so an optimistic entry can be matched exactly.
    CorrelationId
);

external_id!(
    /// A marketplace user, buyer or seller.
    UserId,
    "user_id"
);

external_id!(
    /// A catalog product.
    ProductId,
    "product_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_parses_and_displays() {
        let raw = "550e8400-e29b-41d4-a716-446655440000";
        let id: ConversationId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert!("not-a-uuid".parse::<ConversationId>().is_err());
        assert_ne!(ConversationId::new(), ConversationId::new());
    }

    #[test]
    fn correlation_id_serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&CorrelationId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn user_id_rejects_blank() {
        match UserId::new("   ") {
            Err(ValidationError::EmptyField { field }) => assert_eq!(field, "user_id"),
            other => panic!("Expected EmptyField error, got {:?}", other),
        }
        assert!(ProductId::new("").is_err());
    }

    #[test]
    fn external_ids_validate_on_deserialize() {
        let id: UserId = serde_json::from_str("\"S1\"").unwrap();
        assert_eq!(id.as_str(), "S1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"S1\"");

        assert!(serde_json::from_str::<ProductId>("\"  \"").is_err());
    }
}
