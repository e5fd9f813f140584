//! HTTP DTOs for chat endpoints.
//!
//! These types decouple the HTTP API from domain types, allowing independent evolution.

use serde::{Deserialize, Serialize};

use crate::application::handlers::chat::ResolvedConversation;
use crate::domain::chat::{
    ConversationSummary, EnrichedMessage, Message, ParticipantRole, ProfileSummary,
};
use crate::domain::foundation::CorrelationId;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Request to open (or find) the chat about a product. The caller is the buyer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveConversationRequest {
    pub product_id: String,
    pub seller_id: String,
}

/// Request to send a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    /// Client-generated; replays with the same value return the stored message.
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
}

/// Query parameters for the conversation list.
#[derive(Debug, Clone, Deserialize)]
pub struct ListConversationsParams {
    #[serde(default = "default_role")]
    pub role: ParticipantRole,
}

fn default_role() -> ParticipantRole {
    ParticipantRole::Buyer
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: String,
    pub product_id: String,
    pub client_id: String,
    pub seller_id: String,
    pub created_at: String,
    /// True when this request created the conversation.
    pub created: bool,
}

impl From<ResolvedConversation> for ConversationResponse {
    fn from(resolved: ResolvedConversation) -> Self {
        let conversation = resolved.conversation;
        Self {
            id: conversation.id().to_string(),
            product_id: conversation.product_id().to_string(),
            client_id: conversation.client_id().to_string(),
            seller_id: conversation.seller_id().to_string(),
            created_at: conversation.created_at().to_rfc3339(),
            created: resolved.created,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    /// Store name for sellers that have one, display name otherwise.
    pub label: String,
}

impl From<ProfileSummary> for ProfileResponse {
    fn from(profile: ProfileSummary) -> Self {
        let label = profile.label().to_string();
        Self {
            id: profile.id.to_string(),
            display_name: profile.display_name,
            store_name: profile.store_name,
            label,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
    pub sequence: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<ProfileResponse>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.to_string(),
            conversation_id: message.conversation_id.to_string(),
            sender_id: message.sender_id.to_string(),
            content: message.content.as_str().to_string(),
            created_at: message.created_at.to_rfc3339(),
            sequence: message.sequence,
            correlation_id: message.correlation_id.map(|c| c.to_string()),
            sender: None,
        }
    }
}

impl From<EnrichedMessage> for MessageResponse {
    fn from(enriched: EnrichedMessage) -> Self {
        Self {
            sender: Some(enriched.sender.into()),
            ..enriched.message.into()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryResponse {
    pub conversation_id: String,
    pub product_id: String,
    pub product_name: String,
    pub counterpart: ProfileResponse,
    pub message_count: u64,
    pub created_at: String,
}

impl From<ConversationSummary> for ConversationSummaryResponse {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            conversation_id: summary.conversation_id.to_string(),
            product_id: summary.product_id.to_string(),
            product_name: summary.product_name,
            counterpart: summary.counterpart.into(),
            message_count: summary.message_count,
            created_at: summary.created_at.to_rfc3339(),
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Whether the client may offer a retry.
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            retryable: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::message::fixtures::message_at;
    use crate::domain::chat::{Conversation, ConversationKey};
    use crate::domain::foundation::{ConversationId, ProductId, Timestamp, UserId};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn send_request_accepts_optional_correlation_id() {
        let req: SendMessageRequest = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert!(req.correlation_id.is_none());

        let req: SendMessageRequest = serde_json::from_str(
            r#"{"content": "hi", "correlationId": "6f1c2f0e-3c55-4d7e-9a0b-2b8f1f9c7a11"}"#,
        )
        .unwrap();
        assert!(req.correlation_id.is_some());
    }

    #[test]
    fn list_params_default_to_buyer() {
        let params: ListConversationsParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.role, ParticipantRole::Buyer);

        let params: ListConversationsParams =
            serde_json::from_str(r#"{"role": "seller"}"#).unwrap();
        assert_eq!(params.role, ParticipantRole::Seller);
    }

    #[test]
    fn resolved_conversation_serializes_camel_case() {
        let conversation = Conversation::start(
            ConversationKey::new(ProductId::new("P1").unwrap(), user("B1"), user("S1")).unwrap(),
        );
        let response = ConversationResponse::from(ResolvedConversation {
            conversation,
            created: true,
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["productId"], "P1");
        assert_eq!(json["clientId"], "B1");
        assert_eq!(json["sellerId"], "S1");
        assert_eq!(json["created"], true);
    }

    #[test]
    fn enriched_message_carries_sender_label() {
        let message = message_at(ConversationId::new(), "S1", "Yes!", Timestamp::now(), 1);
        let enriched = EnrichedMessage {
            message,
            sender: ProfileSummary::new(user("S1"), "Sam").with_store_name("Sam's Bikes"),
        };

        let json = serde_json::to_value(MessageResponse::from(enriched)).unwrap();

        assert_eq!(json["content"], "Yes!");
        assert_eq!(json["sender"]["label"], "Sam's Bikes");
        assert!(json.get("correlationId").is_none());
    }
}
