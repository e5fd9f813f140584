//! In-memory conversation repository.
//!
//! Key uniqueness is enforced under one write lock, so concurrent inserts for
//! the same (product, buyer, seller) key produce exactly one row.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::chat::{Conversation, ConversationKey, ParticipantRole};
use crate::domain::foundation::{ConversationId, DomainError, UserId};
use crate::ports::{ConversationRepository, InsertOutcome};

#[derive(Debug, Default)]
struct Rows {
    by_id: HashMap<ConversationId, Conversation>,
    by_key: HashMap<ConversationKey, ConversationId>,
}

/// In-memory conversation storage for tests and single-node development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationRepository {
    rows: Arc<RwLock<Rows>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations.
    pub async fn count(&self) -> usize {
        self.rows.read().await.by_id.len()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_key(&self, key: &ConversationKey) -> Result<Option<Conversation>, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows
            .by_key
            .get(key)
            .and_then(|id| rows.by_id.get(id))
            .cloned())
    }

    async fn insert(&self, conversation: &Conversation) -> Result<InsertOutcome, DomainError> {
        let mut rows = self.rows.write().await;
        if rows.by_key.contains_key(conversation.key()) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        rows.by_key
            .insert(conversation.key().clone(), conversation.id());
        rows.by_id.insert(conversation.id(), conversation.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, DomainError> {
        Ok(self.rows.read().await.by_id.get(id).cloned())
    }

    async fn list_for_participant(
        &self,
        user: &UserId,
        role: ParticipantRole,
    ) -> Result<Vec<Conversation>, DomainError> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Conversation> = rows
            .by_id
            .values()
            .filter(|c| c.role_of(user) == Some(role))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ProductId, Timestamp};

    fn key(product: &str, client: &str, seller: &str) -> ConversationKey {
        ConversationKey::new(
            ProductId::new(product).unwrap(),
            UserId::new(client).unwrap(),
            UserId::new(seller).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_then_find_by_key_and_id() {
        let repo = InMemoryConversationRepository::new();
        let conversation = Conversation::start(key("P1", "B1", "S1"));

        assert_eq!(repo.insert(&conversation).await.unwrap(), InsertOutcome::Inserted);

        let by_key = repo.find_by_key(conversation.key()).await.unwrap();
        assert_eq!(by_key, Some(conversation.clone()));
        let by_id = repo.find_by_id(&conversation.id()).await.unwrap();
        assert_eq!(by_id, Some(conversation));
    }

    #[tokio::test]
    async fn second_insert_for_same_key_reports_already_exists() {
        let repo = InMemoryConversationRepository::new();
        let first = Conversation::start(key("P1", "B1", "S1"));
        let second = Conversation::start(key("P1", "B1", "S1"));

        repo.insert(&first).await.unwrap();
        let outcome = repo.insert(&second).await.unwrap();

        assert_eq!(outcome, InsertOutcome::AlreadyExists);
        assert_eq!(repo.count().await, 1);
        assert_eq!(
            repo.find_by_key(second.key()).await.unwrap().unwrap().id(),
            first.id()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_produce_one_row() {
        let repo = InMemoryConversationRepository::new();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.insert(&Conversation::start(key("P1", "B1", "S1")))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for task in tasks {
            if task.await.unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn list_for_participant_filters_by_role_newest_first() {
        let repo = InMemoryConversationRepository::new();
        let base = Timestamp::now();
        let older = Conversation::reconstitute(ConversationId::new(), key("P1", "B1", "S1"), base);
        let newer = Conversation::reconstitute(
            ConversationId::new(),
            key("P2", "B2", "S1"),
            base.plus_millis(50),
        );
        let as_buyer = Conversation::reconstitute(
            ConversationId::new(),
            key("P3", "S1", "S2"),
            base.plus_millis(100),
        );
        for c in [&older, &newer, &as_buyer] {
            repo.insert(c).await.unwrap();
        }

        let seller = UserId::new("S1").unwrap();
        let selling = repo
            .list_for_participant(&seller, ParticipantRole::Seller)
            .await
            .unwrap();
        let buying = repo
            .list_for_participant(&seller, ParticipantRole::Buyer)
            .await
            .unwrap();

        let ids: Vec<_> = selling.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![newer.id(), older.id()]);
        assert_eq!(buying.len(), 1);
        assert_eq!(buying[0].id(), as_buyer.id());
    }
}
