//! ChatService - the chat handlers wired over one set of ports.
//!
//! Used by the HTTP layer and, through [`ChatGateway`], by in-process chat
//! views.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::chat::{ChatError, Conversation, ConversationSummary, EnrichedMessage, Message};
use crate::domain::foundation::{ConversationId, CorrelationId, ProductId, UserId};
use crate::ports::{
    ChatGateway, ConversationRepository, EventPublisher, MessageStore, ProductCatalog,
    ProfileReader,
};

use super::handlers::chat::{
    ListConversationsHandler, ListConversationsQuery, ListMessagesHandler, ListMessagesQuery,
    ResolveConversationCommand, ResolveConversationHandler, ResolvedConversation,
    SendMessageCommand, SendMessageHandler,
};

/// Ports the chat handlers depend on.
#[derive(Clone)]
pub struct ChatPorts {
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageStore>,
    pub profiles: Arc<dyn ProfileReader>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub events: Arc<dyn EventPublisher>,
}

pub struct ChatService {
    conversations: Arc<dyn ConversationRepository>,
    resolve: ResolveConversationHandler,
    list_messages: ListMessagesHandler,
    send_message: SendMessageHandler,
    list_conversations: ListConversationsHandler,
}

impl ChatService {
    pub fn new(ports: ChatPorts) -> Self {
        Self {
            conversations: ports.conversations.clone(),
            resolve: ResolveConversationHandler::new(
                ports.conversations.clone(),
                ports.catalog.clone(),
                ports.events.clone(),
            ),
            list_messages: ListMessagesHandler::new(
                ports.conversations.clone(),
                ports.messages.clone(),
                ports.profiles.clone(),
            ),
            send_message: SendMessageHandler::new(
                ports.conversations.clone(),
                ports.messages.clone(),
                ports.events,
            ),
            list_conversations: ListConversationsHandler::new(
                ports.conversations,
                ports.messages,
                ports.profiles,
                ports.catalog,
            ),
        }
    }

    /// Load a conversation the viewer takes part in.
    ///
    /// Used to authorize live subscriptions before any channel is opened.
    pub async fn conversation_for(
        &self,
        conversation_id: ConversationId,
        viewer: &UserId,
    ) -> Result<Conversation, ChatError> {
        let conversation = self
            .conversations
            .find_by_id(&conversation_id)
            .await
            .map_err(|e| ChatError::history_load_failed(e.message))?
            .ok_or(ChatError::ConversationNotFound(conversation_id))?;

        if conversation.involves(viewer) {
            Ok(conversation)
        } else {
            Err(ChatError::Forbidden)
        }
    }

    pub async fn resolve_conversation(
        &self,
        cmd: ResolveConversationCommand,
    ) -> Result<ResolvedConversation, ChatError> {
        self.resolve.handle(cmd).await
    }

    pub async fn list_messages(
        &self,
        query: ListMessagesQuery,
    ) -> Result<Vec<EnrichedMessage>, ChatError> {
        self.list_messages.handle(query).await
    }

    pub async fn send_message(&self, cmd: SendMessageCommand) -> Result<Message, ChatError> {
        self.send_message.handle(cmd).await
    }

    pub async fn list_conversations(
        &self,
        query: ListConversationsQuery,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        self.list_conversations.handle(query).await
    }
}

#[async_trait]
impl ChatGateway for ChatService {
    async fn resolve(
        &self,
        product_id: ProductId,
        client_id: UserId,
        seller_id: UserId,
    ) -> Result<Conversation, ChatError> {
        self.resolve_conversation(ResolveConversationCommand {
            product_id,
            client_id,
            seller_id,
        })
        .await
        .map(|resolved| resolved.conversation)
    }

    async fn history(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> Result<Vec<EnrichedMessage>, ChatError> {
        self.list_messages(ListMessagesQuery {
            conversation_id,
            viewer,
        })
        .await
    }

    async fn send(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: String,
        correlation_id: CorrelationId,
    ) -> Result<Message, ChatError> {
        self.send_message(SendMessageCommand {
            conversation_id,
            sender_id,
            content,
            correlation_id: Some(correlation_id),
        })
        .await
    }
}
