//! ListConversationsHandler - the inbox for a buyer or a seller.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::chat::{
    ChatError, ConversationSummary, ParticipantRole, ProfileSummary, UNKNOWN_PRODUCT_NAME,
};
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::{ConversationRepository, MessageStore, ProductCatalog, ProfileReader};

use super::{distinct, lookup_profiles};

/// Query for the conversations a user takes part in under one role.
#[derive(Debug, Clone)]
pub struct ListConversationsQuery {
    pub user_id: UserId,
    pub role: ParticipantRole,
}

/// Handler for the conversation list.
///
/// Newest conversation first. Counts, counterpart profiles and product names
/// are each looked up in one batch; only the repository read can fail.
pub struct ListConversationsHandler {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileReader>,
    catalog: Arc<dyn ProductCatalog>,
}

impl ListConversationsHandler {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageStore>,
        profiles: Arc<dyn ProfileReader>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            conversations,
            messages,
            profiles,
            catalog,
        }
    }

    pub async fn handle(
        &self,
        query: ListConversationsQuery,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        let mut conversations = self
            .conversations
            .list_for_participant(&query.user_id, query.role)
            .await
            .map_err(|e| ChatError::history_load_failed(e.message))?;
        conversations.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        if conversations.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ConversationId> = conversations.iter().map(|c| c.id()).collect();
        let counterparts = distinct(
            conversations
                .iter()
                .filter_map(|c| c.counterpart_of(&query.user_id)),
        );
        let products = distinct(conversations.iter().map(|c| c.product_id()));

        let counts = self
            .messages
            .count_by_conversation(&ids)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "message counts unavailable");
                HashMap::new()
            });
        let profiles = lookup_profiles(self.profiles.as_ref(), &counterparts).await;
        let products = self
            .catalog
            .find_products(&products)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "product names unavailable");
                HashMap::new()
            });

        Ok(conversations
            .into_iter()
            .filter_map(|conversation| {
                let counterpart_id = conversation.counterpart_of(&query.user_id)?.clone();
                let counterpart = profiles
                    .get(&counterpart_id)
                    .cloned()
                    .unwrap_or_else(|| ProfileSummary::unknown(counterpart_id));
                let product_name = products
                    .get(conversation.product_id())
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| UNKNOWN_PRODUCT_NAME.to_string());

                Some(ConversationSummary {
                    conversation_id: conversation.id(),
                    product_id: conversation.product_id().clone(),
                    product_name,
                    counterpart,
                    message_count: counts.get(&conversation.id()).copied().unwrap_or(0),
                    created_at: conversation.created_at(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::memory::{InMemoryConversationRepository, InMemoryMessageStore};
    use crate::domain::chat::{
        Conversation, ConversationKey, MessageContent, NewMessage, ProductSummary,
    };
    use crate::domain::foundation::{DomainError, Timestamp};
    use crate::ports::{ConversationRepository, InsertOutcome, MessageStore};
    use async_trait::async_trait;

    struct Fixture {
        conversations: Arc<InMemoryConversationRepository>,
        store: Arc<InMemoryMessageStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                conversations: Arc::new(InMemoryConversationRepository::new()),
                store: Arc::new(InMemoryMessageStore::new()),
            }
        }

        async fn open(&self, product_id: &str, client: &str, seller: &str, age_ms: i64) -> Conversation {
            let key = ConversationKey::new(product(product_id), user(client), user(seller)).unwrap();
            let conversation = Conversation::reconstitute(
                ConversationId::new(),
                key,
                Timestamp::now().plus_millis(-age_ms),
            );
            self.conversations.insert(&conversation).await.unwrap();
            conversation
        }

        async fn say(&self, conversation: &Conversation, sender: &str) {
            self.store
                .append(NewMessage {
                    conversation_id: conversation.id(),
                    sender_id: user(sender),
                    content: MessageContent::new("hi").unwrap(),
                    correlation_id: None,
                })
                .await
                .unwrap();
        }

        fn handler(&self, profiles: MockProfileReader, catalog: MockProductCatalog) -> ListConversationsHandler {
            ListConversationsHandler::new(
                self.conversations.clone(),
                self.store.clone(),
                Arc::new(profiles),
                Arc::new(catalog),
            )
        }
    }

    fn bikes() -> MockProductCatalog {
        MockProductCatalog::with(vec![
            ProductSummary {
                id: product("P1"),
                name: "Road bike".to_string(),
                seller_id: user("S1"),
            },
            ProductSummary {
                id: product("P2"),
                name: "Helmet".to_string(),
                seller_id: user("S1"),
            },
        ])
    }

    struct BrokenRepository;

    #[async_trait]
    impl ConversationRepository for BrokenRepository {
        async fn find_by_key(&self, _k: &ConversationKey) -> Result<Option<Conversation>, DomainError> {
            Err(DomainError::database("down"))
        }

        async fn insert(&self, _c: &Conversation) -> Result<InsertOutcome, DomainError> {
            Err(DomainError::database("down"))
        }

        async fn find_by_id(&self, _id: &ConversationId) -> Result<Option<Conversation>, DomainError> {
            Err(DomainError::database("down"))
        }

        async fn list_for_participant(
            &self,
            _user: &UserId,
            _role: ParticipantRole,
        ) -> Result<Vec<Conversation>, DomainError> {
            Err(DomainError::database("down"))
        }
    }

    #[tokio::test]
    async fn seller_inbox_lists_newest_first_with_counts() {
        let fx = Fixture::new();
        let older = fx.open("P1", "B1", "S1", 60_000).await;
        let newer = fx.open("P2", "B2", "S1", 1_000).await;
        fx.say(&older, "B1").await;
        fx.say(&older, "S1").await;
        let handler = fx.handler(
            MockProfileReader::with(vec![
                ProfileSummary::new(user("B1"), "Bea"),
                ProfileSummary::new(user("B2"), "Bo"),
            ]),
            bikes(),
        );

        let inbox = handler
            .handle(ListConversationsQuery {
                user_id: user("S1"),
                role: ParticipantRole::Seller,
            })
            .await
            .unwrap();

        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].conversation_id, newer.id());
        assert_eq!(inbox[0].product_name, "Helmet");
        assert_eq!(inbox[0].counterpart.display_name, "Bo");
        assert_eq!(inbox[0].message_count, 0);
        assert_eq!(inbox[1].conversation_id, older.id());
        assert_eq!(inbox[1].message_count, 2);
    }

    #[tokio::test]
    async fn role_filters_by_side() {
        let fx = Fixture::new();
        fx.open("P1", "U1", "S1", 0).await;
        fx.open("P3", "B1", "U1", 0).await;
        let handler = fx.handler(MockProfileReader::with(vec![]), bikes());

        let as_buyer = handler
            .handle(ListConversationsQuery {
                user_id: user("U1"),
                role: ParticipantRole::Buyer,
            })
            .await
            .unwrap();

        assert_eq!(as_buyer.len(), 1);
        assert_eq!(as_buyer[0].counterpart.id, user("S1"));
    }

    #[tokio::test]
    async fn lookup_outages_degrade_to_placeholders() {
        let fx = Fixture::new();
        fx.open("P1", "B1", "S1", 0).await;
        let handler = fx.handler(MockProfileReader::failing(), MockProductCatalog::failing());

        let inbox = handler
            .handle(ListConversationsQuery {
                user_id: user("B1"),
                role: ParticipantRole::Buyer,
            })
            .await
            .unwrap();

        assert!(inbox[0].counterpart.is_unknown());
        assert_eq!(inbox[0].product_name, UNKNOWN_PRODUCT_NAME);
    }

    #[tokio::test]
    async fn empty_inbox_is_ok() {
        let fx = Fixture::new();
        let handler = fx.handler(MockProfileReader::with(vec![]), bikes());

        let inbox = handler
            .handle(ListConversationsQuery {
                user_id: user("S1"),
                role: ParticipantRole::Seller,
            })
            .await
            .unwrap();

        assert!(inbox.is_empty());
    }

    #[tokio::test]
    async fn repository_failure_is_history_load_failed() {
        let handler = ListConversationsHandler::new(
            Arc::new(BrokenRepository),
            Arc::new(InMemoryMessageStore::new()),
            Arc::new(MockProfileReader::with(vec![])),
            Arc::new(bikes()),
        );

        let err = handler
            .handle(ListConversationsQuery {
                user_id: user("S1"),
                role: ParticipantRole::Seller,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::HistoryLoadFailed(_)));
    }
}
