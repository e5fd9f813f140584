//! Chat error taxonomy.
//!
//! Storage and transport failures are translated into these variants at each
//! component boundary; nothing below this layer reaches the UI unwrapped.

use thiserror::Error;

use crate::domain::foundation::{ConversationId, DomainError, ErrorCode, ValidationError};

/// Errors surfaced by the chat subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Conversation could not be looked up or created. Retryable.
    #[error("Conversation could not be resolved: {0}")]
    ResolutionFailed(String),

    /// Message listing failed. Retryable; an open subscription is unaffected.
    #[error("Message history could not be loaded: {0}")]
    HistoryLoadFailed(String),

    /// Realtime channel dropped. Recover by re-subscribing and re-fetching.
    #[error("Realtime subscription degraded: {0}")]
    SubscriptionDegraded(String),

    /// Durable write of a message did not succeed. The user must resubmit.
    #[error("Message could not be sent: {0}")]
    SendFailed(String),

    /// Buyer and seller are the same identity.
    #[error("A seller cannot open a chat with themself")]
    SelfChatRejected,

    /// Content was empty after trimming.
    #[error("Message content cannot be empty")]
    EmptyMessage,

    /// Content exceeded the maximum length.
    #[error("Message content exceeds {max} characters")]
    MessageTooLong { max: usize },

    /// A send is already in flight for this conversation view.
    #[error("A message is already being sent")]
    SendInFlight,

    /// Product unknown or seller does not own the product.
    #[error("Invalid participants: {0}")]
    InvalidParticipants(String),

    /// Conversation does not exist.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Caller is neither the buyer nor the seller of the conversation.
    #[error("Not a participant of this conversation")]
    Forbidden,

    /// The chat view has been torn down.
    #[error("Chat view is closed")]
    ViewClosed,
}

impl ChatError {
    pub fn resolution_failed(message: impl Into<String>) -> Self {
        ChatError::ResolutionFailed(message.into())
    }

    pub fn history_load_failed(message: impl Into<String>) -> Self {
        ChatError::HistoryLoadFailed(message.into())
    }

    pub fn subscription_degraded(message: impl Into<String>) -> Self {
        ChatError::SubscriptionDegraded(message.into())
    }

    pub fn send_failed(message: impl Into<String>) -> Self {
        ChatError::SendFailed(message.into())
    }

    pub fn invalid_participants(message: impl Into<String>) -> Self {
        ChatError::InvalidParticipants(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ChatError::ResolutionFailed(_) => ErrorCode::ResolutionFailed,
            ChatError::HistoryLoadFailed(_) => ErrorCode::HistoryLoadFailed,
            ChatError::SubscriptionDegraded(_) => ErrorCode::SubscriptionDegraded,
            ChatError::SendFailed(_) => ErrorCode::SendFailed,
            ChatError::SelfChatRejected => ErrorCode::SelfChatRejected,
            ChatError::EmptyMessage => ErrorCode::EmptyMessage,
            ChatError::MessageTooLong { .. } => ErrorCode::MessageTooLong,
            ChatError::SendInFlight => ErrorCode::SendInFlight,
            ChatError::InvalidParticipants(_) => ErrorCode::InvalidParticipants,
            ChatError::ConversationNotFound(_) => ErrorCode::ConversationNotFound,
            ChatError::Forbidden => ErrorCode::Forbidden,
            ChatError::ViewClosed => ErrorCode::ViewClosed,
        }
    }

    /// Whether the caller may offer a retry affordance.
    ///
    /// Send failures are retryable only by the user resubmitting; nothing in
    /// the pipeline retries them automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChatError::ResolutionFailed(_)
                | ChatError::HistoryLoadFailed(_)
                | ChatError::SubscriptionDegraded(_)
                | ChatError::SendFailed(_)
        )
    }
}

impl From<ValidationError> for ChatError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyField { ref field } if field == "content" => {
                ChatError::EmptyMessage
            }
            ValidationError::TooLong { ref field, max, .. } if field == "content" => {
                ChatError::MessageTooLong { max }
            }
            other => ChatError::InvalidParticipants(other.to_string()),
        }
    }
}

impl From<ChatError> for DomainError {
    fn from(err: ChatError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(
            ChatError::resolution_failed("db down").code(),
            ErrorCode::ResolutionFailed
        );
        assert_eq!(ChatError::SelfChatRejected.code(), ErrorCode::SelfChatRejected);
        assert_eq!(ChatError::send_failed("x").code(), ErrorCode::SendFailed);
    }

    #[test]
    fn precondition_violations_are_not_retryable() {
        assert!(!ChatError::SelfChatRejected.is_retryable());
        assert!(!ChatError::EmptyMessage.is_retryable());
        assert!(ChatError::history_load_failed("timeout").is_retryable());
        assert!(ChatError::subscription_degraded("dropped").is_retryable());
    }

    #[test]
    fn empty_content_validation_maps_to_empty_message() {
        let err: ChatError = ValidationError::empty_field("content").into();
        assert_eq!(err, ChatError::EmptyMessage);
    }

    #[test]
    fn too_long_content_validation_maps_to_message_too_long() {
        let err: ChatError = ValidationError::too_long("content", 10, 11).into();
        assert_eq!(err, ChatError::MessageTooLong { max: 10 });
    }

    #[test]
    fn other_validation_maps_to_invalid_participants() {
        let err: ChatError = ValidationError::empty_field("seller_id").into();
        assert!(matches!(err, ChatError::InvalidParticipants(_)));
    }

    #[test]
    fn converts_into_domain_error_with_code() {
        let err: DomainError = ChatError::Forbidden.into();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }
}
