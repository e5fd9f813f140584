//! ResolveConversationHandler - find-or-create the conversation for a
//! (product, buyer, seller) triple.

use std::sync::Arc;

use crate::domain::chat::{ChatError, Conversation, ConversationKey, ConversationStarted};
use crate::domain::foundation::{EventId, ProductId, SerializableDomainEvent, UserId};
use crate::ports::{ConversationRepository, EventPublisher, InsertOutcome, ProductCatalog};

/// Command to open the buyer/seller chat for a product.
#[derive(Debug, Clone)]
pub struct ResolveConversationCommand {
    pub product_id: ProductId,
    /// The buyer; normally the authenticated caller.
    pub client_id: UserId,
    pub seller_id: UserId,
}

/// The resolved conversation and whether this call created it.
#[derive(Debug, Clone)]
pub struct ResolvedConversation {
    pub conversation: Conversation,
    pub created: bool,
}

/// Handler for conversation resolution.
///
/// Concurrent first contacts are arbitrated by the repository's uniqueness
/// constraint; the loser re-reads the winning row.
pub struct ResolveConversationHandler {
    conversations: Arc<dyn ConversationRepository>,
    catalog: Arc<dyn ProductCatalog>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ResolveConversationHandler {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        catalog: Arc<dyn ProductCatalog>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            conversations,
            catalog,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: ResolveConversationCommand,
    ) -> Result<ResolvedConversation, ChatError> {
        // 1. Identity check happens before any I/O
        let key = ConversationKey::new(cmd.product_id, cmd.client_id, cmd.seller_id)?;

        // 2. Product must exist and belong to the seller
        self.verify_listing(&key).await?;

        // 3. Existing conversation wins
        if let Some(existing) = self
            .conversations
            .find_by_key(&key)
            .await
            .map_err(|e| ChatError::resolution_failed(e.message))?
        {
            return Ok(ResolvedConversation {
                conversation: existing,
                created: false,
            });
        }

        // 4. Insert; a concurrent creator may beat us to it
        let candidate = Conversation::start(key.clone());
        let outcome = self
            .conversations
            .insert(&candidate)
            .await
            .map_err(|e| ChatError::resolution_failed(e.message))?;

        match outcome {
            InsertOutcome::Inserted => {
                tracing::info!(
                    conversation_id = %candidate.id(),
                    product_id = %candidate.product_id(),
                    "conversation started"
                );
                self.publish_started(&candidate).await;
                Ok(ResolvedConversation {
                    conversation: candidate,
                    created: true,
                })
            }
            InsertOutcome::AlreadyExists => {
                let winner = self
                    .conversations
                    .find_by_key(&key)
                    .await
                    .map_err(|e| ChatError::resolution_failed(e.message))?
                    .ok_or_else(|| {
                        ChatError::resolution_failed("conversation vanished after conflict")
                    })?;
                tracing::debug!(conversation_id = %winner.id(), "lost creation race, reusing winner");
                Ok(ResolvedConversation {
                    conversation: winner,
                    created: false,
                })
            }
        }
    }

    async fn verify_listing(&self, key: &ConversationKey) -> Result<(), ChatError> {
        let products = self
            .catalog
            .find_products(std::slice::from_ref(key.product_id()))
            .await
            .map_err(|e| ChatError::resolution_failed(e.message))?;

        let listing = products.get(key.product_id()).ok_or_else(|| {
            ChatError::invalid_participants(format!("unknown product {}", key.product_id()))
        })?;

        if &listing.seller_id != key.seller_id() {
            return Err(ChatError::invalid_participants(format!(
                "{} does not sell product {}",
                key.seller_id(),
                key.product_id()
            )));
        }
        Ok(())
    }

    /// Best effort; a publish failure never fails the resolve.
    async fn publish_started(&self, conversation: &Conversation) {
        let event = ConversationStarted {
            event_id: EventId::new(),
            conversation_id: conversation.id(),
            product_id: conversation.product_id().clone(),
            client_id: conversation.client_id().clone(),
            seller_id: conversation.seller_id().clone(),
            started_at: conversation.created_at(),
        };

        let result = match event.to_envelope() {
            Ok(envelope) => self
                .event_publisher
                .publish(envelope.with_user_id(conversation.client_id().as_str()))
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(error) = result {
            tracing::warn!(conversation_id = %conversation.id(), %error, "failed to publish conversation started");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::memory::InMemoryConversationRepository;
    use crate::domain::chat::{ParticipantRole, ProductSummary, CONVERSATION_STARTED};
    use crate::domain::foundation::{ConversationId, DomainError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn catalog() -> Arc<MockProductCatalog> {
        Arc::new(MockProductCatalog::with(vec![ProductSummary {
            id: product("P1"),
            name: "Road bike".to_string(),
            seller_id: user("S1"),
        }]))
    }

    fn command(client: &str, seller: &str) -> ResolveConversationCommand {
        ResolveConversationCommand {
            product_id: product("P1"),
            client_id: user(client),
            seller_id: user(seller),
        }
    }

    /// Repository that always reports a lost race on insert, then returns
    /// whatever `winner` holds on the re-read.
    struct RacingRepository {
        winner: Mutex<Option<Conversation>>,
        reads: Mutex<u32>,
    }

    #[async_trait]
    impl ConversationRepository for RacingRepository {
        async fn find_by_key(
            &self,
            _key: &ConversationKey,
        ) -> Result<Option<Conversation>, DomainError> {
            let mut reads = self.reads.lock().unwrap();
            *reads += 1;
            if *reads == 1 {
                return Ok(None);
            }
            Ok(self.winner.lock().unwrap().clone())
        }

        async fn insert(&self, _c: &Conversation) -> Result<InsertOutcome, DomainError> {
            Ok(InsertOutcome::AlreadyExists)
        }

        async fn find_by_id(&self, _id: &ConversationId) -> Result<Option<Conversation>, DomainError> {
            Ok(None)
        }

        async fn list_for_participant(
            &self,
            _user: &UserId,
            _role: ParticipantRole,
        ) -> Result<Vec<Conversation>, DomainError> {
            Ok(vec![])
        }
    }

    struct BrokenRepository;

    #[async_trait]
    impl ConversationRepository for BrokenRepository {
        async fn find_by_key(&self, _k: &ConversationKey) -> Result<Option<Conversation>, DomainError> {
            Err(DomainError::database("connection reset"))
        }

        async fn insert(&self, _c: &Conversation) -> Result<InsertOutcome, DomainError> {
            Err(DomainError::database("connection reset"))
        }

        async fn find_by_id(&self, _id: &ConversationId) -> Result<Option<Conversation>, DomainError> {
            Err(DomainError::database("connection reset"))
        }

        async fn list_for_participant(
            &self,
            _user: &UserId,
            _role: ParticipantRole,
        ) -> Result<Vec<Conversation>, DomainError> {
            Err(DomainError::database("connection reset"))
        }
    }

    #[tokio::test]
    async fn first_contact_creates_and_publishes() {
        let repo = Arc::new(InMemoryConversationRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());
        let handler = ResolveConversationHandler::new(repo.clone(), catalog(), publisher.clone());

        let resolved = handler.handle(command("B1", "S1")).await.unwrap();

        assert!(resolved.created);
        assert_eq!(resolved.conversation.client_id(), &user("B1"));
        assert_eq!(repo.count().await, 1);
        let events = publisher.published_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, CONVERSATION_STARTED);
        assert_eq!(events[0].aggregate_id, resolved.conversation.id().to_string());
    }

    /// Stand-in for a consumer outside the chat core.
    struct StartedRecorder(Mutex<Vec<ConversationStarted>>);

    #[async_trait]
    impl crate::ports::EventHandler for StartedRecorder {
        async fn handle(&self, event: crate::domain::foundation::EventEnvelope) -> Result<(), DomainError> {
            self.0.lock().unwrap().push(event.payload_as().unwrap());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "StartedRecorder"
        }
    }

    #[tokio::test]
    async fn subscribers_see_conversation_started_once() {
        use crate::adapters::InMemoryEventBus;
        use crate::ports::EventSubscriber;

        let bus = Arc::new(InMemoryEventBus::new());
        let recorder = Arc::new(StartedRecorder(Mutex::new(Vec::new())));
        bus.subscribe(CONVERSATION_STARTED, recorder.clone());
        let handler = ResolveConversationHandler::new(
            Arc::new(InMemoryConversationRepository::new()),
            catalog(),
            bus,
        );

        let resolved = handler.handle(command("B1", "S1")).await.unwrap();
        handler.handle(command("B1", "S1")).await.unwrap();

        let started = recorder.0.lock().unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].conversation_id, resolved.conversation.id());
        assert_eq!(started[0].seller_id, user("S1"));
    }

    #[tokio::test]
    async fn second_resolve_returns_same_conversation() {
        let repo = Arc::new(InMemoryConversationRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());
        let handler = ResolveConversationHandler::new(repo.clone(), catalog(), publisher.clone());

        let first = handler.handle(command("B1", "S1")).await.unwrap();
        let second = handler.handle(command("B1", "S1")).await.unwrap();

        assert_eq!(first.conversation.id(), second.conversation.id());
        assert!(!second.created);
        assert_eq!(repo.count().await, 1);
        assert_eq!(publisher.published_events().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_contact_yields_one_row() {
        let repo = Arc::new(InMemoryConversationRepository::new());
        let handler = Arc::new(ResolveConversationHandler::new(
            repo.clone(),
            catalog(),
            Arc::new(MockEventPublisher::new()),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handler = handler.clone();
                tokio::spawn(async move { handler.handle(command("B1", "S1")).await })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().conversation.id());
        }

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn lost_race_rereads_winner() {
        let winner = Conversation::start(
            ConversationKey::new(product("P1"), user("B1"), user("S1")).unwrap(),
        );
        let repo = Arc::new(RacingRepository {
            winner: Mutex::new(Some(winner.clone())),
            reads: Mutex::new(0),
        });
        let publisher = Arc::new(MockEventPublisher::new());
        let handler = ResolveConversationHandler::new(repo, catalog(), publisher.clone());

        let resolved = handler.handle(command("B1", "S1")).await.unwrap();

        assert_eq!(resolved.conversation.id(), winner.id());
        assert!(!resolved.created);
        assert!(publisher.published_events().is_empty());
    }

    #[tokio::test]
    async fn lost_race_with_missing_winner_fails_resolution() {
        let repo = Arc::new(RacingRepository {
            winner: Mutex::new(None),
            reads: Mutex::new(0),
        });
        let handler =
            ResolveConversationHandler::new(repo, catalog(), Arc::new(MockEventPublisher::new()));

        let err = handler.handle(command("B1", "S1")).await.unwrap_err();

        assert!(matches!(err, ChatError::ResolutionFailed(_)));
    }

    #[tokio::test]
    async fn self_chat_rejected_before_io() {
        let repo = Arc::new(InMemoryConversationRepository::new());
        let handler = ResolveConversationHandler::new(
            repo.clone(),
            Arc::new(MockProductCatalog::failing()),
            Arc::new(MockEventPublisher::new()),
        );

        let err = handler.handle(command("S1", "S1")).await.unwrap_err();

        assert_eq!(err, ChatError::SelfChatRejected);
        assert_eq!(repo.count().await, 0);
    }

    #[tokio::test]
    async fn wrong_seller_is_invalid_participants() {
        let handler = ResolveConversationHandler::new(
            Arc::new(InMemoryConversationRepository::new()),
            catalog(),
            Arc::new(MockEventPublisher::new()),
        );

        let err = handler.handle(command("B1", "S2")).await.unwrap_err();

        assert!(matches!(err, ChatError::InvalidParticipants(_)));
    }

    #[tokio::test]
    async fn unknown_product_is_invalid_participants() {
        let handler = ResolveConversationHandler::new(
            Arc::new(InMemoryConversationRepository::new()),
            Arc::new(MockProductCatalog::with(vec![])),
            Arc::new(MockEventPublisher::new()),
        );

        let err = handler.handle(command("B1", "S1")).await.unwrap_err();

        assert!(matches!(err, ChatError::InvalidParticipants(_)));
    }

    #[tokio::test]
    async fn storage_failure_is_resolution_failed() {
        let handler = ResolveConversationHandler::new(
            Arc::new(BrokenRepository),
            catalog(),
            Arc::new(MockEventPublisher::new()),
        );

        let err = handler.handle(command("B1", "S1")).await.unwrap_err();

        assert!(matches!(err, ChatError::ResolutionFailed(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn catalog_outage_is_resolution_failed() {
        let handler = ResolveConversationHandler::new(
            Arc::new(InMemoryConversationRepository::new()),
            Arc::new(MockProductCatalog::failing()),
            Arc::new(MockEventPublisher::new()),
        );

        let err = handler.handle(command("B1", "S1")).await.unwrap_err();

        assert!(matches!(err, ChatError::ResolutionFailed(_)));
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_creation() {
        let repo = Arc::new(InMemoryConversationRepository::new());
        let handler = ResolveConversationHandler::new(
            repo.clone(),
            catalog(),
            Arc::new(MockEventPublisher::failing()),
        );

        let resolved = handler.handle(command("B1", "S1")).await.unwrap();

        assert!(resolved.created);
        assert_eq!(repo.count().await, 1);
    }
}
