//! ChatGateway port - what a chat view needs from the server side.
//!
//! `application::ChatService` implements it in-process over the handlers; a
//! remote client would implement it over HTTP.

use async_trait::async_trait;

use crate::domain::chat::{ChatError, Conversation, EnrichedMessage, Message};
use crate::domain::foundation::{ConversationId, CorrelationId, ProductId, UserId};

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Return or create the conversation for the triple.
    async fn resolve(
        &self,
        product_id: ProductId,
        client_id: UserId,
        seller_id: UserId,
    ) -> Result<Conversation, ChatError>;

    /// Ordered, enriched history as seen by `viewer`.
    async fn history(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> Result<Vec<EnrichedMessage>, ChatError>;

    /// Durably send one message. Never retried by the gateway.
    async fn send(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: String,
        correlation_id: CorrelationId,
    ) -> Result<Message, ChatError>;
}
