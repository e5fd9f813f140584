//! Read-model projections: sender display info, product info, inbox rows.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConversationId, ProductId, Timestamp, UserId};

use super::Message;

/// Display name shown when a profile cannot be resolved.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// Product name shown when the catalog cannot resolve a product.
pub const UNKNOWN_PRODUCT_NAME: &str = "Unknown product";

/// Minimal display projection of a user, owned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: UserId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
}

impl ProfileSummary {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            store_name: None,
        }
    }

    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = Some(store_name.into());
        self
    }

    /// Neutral placeholder for ids the identity service could not resolve.
    pub fn unknown(id: UserId) -> Self {
        Self::new(id, UNKNOWN_DISPLAY_NAME)
    }

    pub fn is_unknown(&self) -> bool {
        self.display_name == UNKNOWN_DISPLAY_NAME && self.store_name.is_none()
    }

    /// Store name for sellers that have one, display name otherwise.
    pub fn label(&self) -> &str {
        self.store_name.as_deref().unwrap_or(&self.display_name)
    }
}

/// Product projection from the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    /// The product's recorded seller.
    pub seller_id: UserId,
}

/// A message joined with its sender's display info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedMessage {
    pub message: Message,
    pub sender: ProfileSummary,
}

/// One inbox row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub product_id: ProductId,
    pub product_name: String,
    pub counterpart: ProfileSummary,
    pub message_count: u64,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_placeholder_is_detectable() {
        let summary = ProfileSummary::unknown(UserId::new("ghost").unwrap());
        assert_eq!(summary.display_name, "Unknown");
        assert!(summary.is_unknown());
    }

    #[test]
    fn label_prefers_store_name() {
        let seller =
            ProfileSummary::new(UserId::new("S1").unwrap(), "sam@example.com").with_store_name("Sam's Bikes");
        assert_eq!(seller.label(), "Sam's Bikes");

        let buyer = ProfileSummary::new(UserId::new("B1").unwrap(), "bea@example.com");
        assert_eq!(buyer.label(), "bea@example.com");
    }
}
