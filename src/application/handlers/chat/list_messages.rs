//! ListMessagesHandler - ordered, sender-enriched history of one conversation.

use std::sync::Arc;

use crate::domain::chat::{sort_canonical, ChatError, EnrichedMessage, ProfileSummary};
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::{ConversationRepository, MessageStore, ProfileReader};

use super::{distinct, lookup_profiles};

/// Query for a conversation's full message history.
#[derive(Debug, Clone)]
pub struct ListMessagesQuery {
    pub conversation_id: ConversationId,
    /// Must be the conversation's buyer or seller.
    pub viewer: UserId,
}

/// Handler for listing messages.
pub struct ListMessagesHandler {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileReader>,
}

impl ListMessagesHandler {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageStore>,
        profiles: Arc<dyn ProfileReader>,
    ) -> Self {
        Self {
            conversations,
            messages,
            profiles,
        }
    }

    pub async fn handle(&self, query: ListMessagesQuery) -> Result<Vec<EnrichedMessage>, ChatError> {
        let conversation = self
            .conversations
            .find_by_id(&query.conversation_id)
            .await
            .map_err(|e| ChatError::history_load_failed(e.message))?
            .ok_or(ChatError::ConversationNotFound(query.conversation_id))?;

        if !conversation.involves(&query.viewer) {
            return Err(ChatError::Forbidden);
        }

        let mut messages = self
            .messages
            .list(&query.conversation_id)
            .await
            .map_err(|e| ChatError::history_load_failed(e.message))?;
        sort_canonical(&mut messages);

        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let senders = distinct(messages.iter().map(|m| &m.sender_id));
        let profiles = lookup_profiles(self.profiles.as_ref(), &senders).await;

        Ok(messages
            .into_iter()
            .map(|message| {
                let sender = profiles
                    .get(&message.sender_id)
                    .cloned()
                    .unwrap_or_else(|| ProfileSummary::unknown(message.sender_id.clone()));
                EnrichedMessage { message, sender }
            })
            .collect())
    }
}
