//! End-to-end chat flow over the in-memory adapters.
//!
//! Wires the real handlers, event bus, realtime bridge, subscription manager
//! and chat views together, with only storage and directories in memory.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use market_chat::adapters::memory::{
    InMemoryConversationRepository, InMemoryMessageStore, InMemoryProductCatalog,
    InMemoryProfileDirectory,
};
use market_chat::adapters::realtime::{InMemoryTransport, RealtimeEventBridge, SubscriptionManager};
use market_chat::adapters::InMemoryEventBus;
use market_chat::application::handlers::chat::{
    ListConversationsQuery, ListMessagesQuery, ResolveConversationCommand,
};
use market_chat::application::{ChatClient, ChatPorts, ChatService, ChatView, SendOutcome, ViewUpdate};
use market_chat::config::ChatConfig;
use market_chat::application::handlers::chat::SendMessageCommand;
use market_chat::domain::chat::{
    ChatError, ParticipantRole, ProductSummary, ProfileSummary, MESSAGE_INSERTED,
};
use market_chat::domain::foundation::{
    ConversationId, DomainError, EventEnvelope, MessageId, ProductId, UserId,
};
use market_chat::ports::{
    channel_for, DeliveryBus, DeliveryEvent, DeliveryListener, EventPublisher,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const WAIT: Duration = Duration::from_secs(2);

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn product(id: &str) -> ProductId {
    ProductId::new(id).unwrap()
}

struct Harness {
    service: Arc<ChatService>,
    conversations: Arc<InMemoryConversationRepository>,
    store: Arc<InMemoryMessageStore>,
    transport: Arc<InMemoryTransport>,
    bus: Arc<SubscriptionManager>,
    client: ChatClient,
}

/// Event bus wrapper that holds back the first message event.
struct StallFirstMessage {
    inner: Arc<InMemoryEventBus>,
    stalled: Mutex<bool>,
}

#[async_trait]
impl EventPublisher for StallFirstMessage {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if event.event_type == MESSAGE_INSERTED {
            let stall = std::mem::replace(&mut *self.stalled.lock().unwrap(), false);
            if stall {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
        self.inner.publish(event).await
    }
}

/// Records the sequence of every delivered message.
#[derive(Default)]
struct SequenceRecorder(Mutex<Vec<i64>>);

impl DeliveryListener for SequenceRecorder {
    fn on_event(&self, event: DeliveryEvent) {
        if let DeliveryEvent::Message(message) = event {
            self.0.lock().unwrap().push(message.sequence);
        }
    }
}

impl Harness {
    async fn new() -> Self {
        Self::build(false).await
    }

    async fn with_slow_first_delivery() -> Self {
        Self::build(true).await
    }

    async fn build(stall_first_message: bool) -> Self {
        let conversations = Arc::new(InMemoryConversationRepository::new());
        let store = Arc::new(InMemoryMessageStore::new());

        let profiles = InMemoryProfileDirectory::new();
        profiles.insert(ProfileSummary::new(user("B1"), "Bea")).await;
        profiles
            .insert(ProfileSummary::new(user("S1"), "Sam").with_store_name("Sam's Bikes"))
            .await;
        let catalog = InMemoryProductCatalog::new();
        catalog
            .insert(ProductSummary {
                id: product("P1"),
                name: "Road bike".to_string(),
                seller_id: user("S1"),
            })
            .await;

        let transport = Arc::new(InMemoryTransport::default());
        let events = Arc::new(InMemoryEventBus::new());
        RealtimeEventBridge::new_shared(transport.clone()).register(events.as_ref());
        let events: Arc<dyn EventPublisher> = if stall_first_message {
            Arc::new(StallFirstMessage {
                inner: events,
                stalled: Mutex::new(true),
            })
        } else {
            events
        };

        let service = Arc::new(ChatService::new(ChatPorts {
            conversations: conversations.clone(),
            messages: store.clone(),
            profiles: Arc::new(profiles),
            catalog: Arc::new(catalog),
            events,
        }));
        let bus = Arc::new(SubscriptionManager::new(transport.clone()));
        let client = ChatClient::new(service.clone(), bus.clone(), ChatConfig::default());

        Self {
            service,
            conversations,
            store,
            transport,
            bus,
            client,
        }
    }

    async fn open_buyer_chat(&self) -> ChatView {
        self.client
            .open_product_chat(user("B1"), product("P1"), user("S1"))
            .await
            .unwrap()
    }

    async fn open_seller_chat(&self, conversation_id: ConversationId) -> ChatView {
        self.client
            .open_conversation(user("S1"), conversation_id)
            .await
            .unwrap()
    }
}

fn command(conversation_id: ConversationId, sender: &str, content: &str) -> SendMessageCommand {
    SendMessageCommand {
        conversation_id,
        sender_id: user(sender),
        content: content.to_string(),
        correlation_id: None,
    }
}

async fn send(view: &mut ChatView, text: &str) -> SendOutcome {
    view.set_draft(text);
    view.submit().unwrap().complete().await
}

/// Applies bus updates until `text` is on screen.
async fn wait_for(view: &mut ChatView, text: &str) -> Vec<ViewUpdate> {
    let mut updates = Vec::new();
    while !view.contents().iter().any(|c| c == text) {
        let update = tokio::time::timeout(WAIT, view.next_update())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {:?}", text))
            .expect("view closed");
        updates.push(update);
    }
    updates
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn buyer_and_seller_exchange_messages() {
    let h = Harness::new().await;

    let resolves: Vec<_> = (0..2)
        .map(|_| {
            let service = h.service.clone();
            tokio::spawn(async move {
                service
                    .resolve_conversation(ResolveConversationCommand {
                        product_id: product("P1"),
                        client_id: user("B1"),
                        seller_id: user("S1"),
                    })
                    .await
            })
        })
        .collect();
    let mut ids = Vec::new();
    for task in resolves {
        ids.push(task.await.unwrap().unwrap().conversation.id());
    }
    assert_eq!(ids[0], ids[1]);
    assert_eq!(h.conversations.count().await, 1);

    let mut buyer = h.open_buyer_chat().await;
    assert_eq!(buyer.conversation_id(), ids[0]);
    let mut seller = h.open_seller_chat(ids[0]).await;

    buyer.set_draft("Is this available?");
    let pending = buyer.submit().unwrap();
    assert_eq!(buyer.contents(), vec!["Is this available?"]);
    assert!(buyer.draft().is_empty());
    assert!(matches!(pending.complete().await, SendOutcome::Confirmed(_)));

    wait_for(&mut seller, "Is this available?").await;
    assert!(matches!(send(&mut seller, "Yes!").await, SendOutcome::Confirmed(_)));
    wait_for(&mut buyer, "Yes!").await;

    assert_eq!(buyer.contents(), vec!["Is this available?", "Yes!"]);
    assert_eq!(seller.contents(), vec!["Is this available?", "Yes!"]);

    let history = h
        .service
        .list_messages(ListMessagesQuery {
            conversation_id: ids[0],
            viewer: user("B1"),
        })
        .await
        .unwrap();
    let lines: Vec<(&str, &str)> = history
        .iter()
        .map(|e| (e.sender.label(), e.message.content.as_str()))
        .collect();
    assert_eq!(
        lines,
        vec![("Bea", "Is this available?"), ("Sam's Bikes", "Yes!")]
    );
}

#[tokio::test]
async fn own_message_is_not_shown_twice() {
    let h = Harness::new().await;
    let mut buyer = h.open_buyer_chat().await;

    let outcome = send(&mut buyer, "hello").await;
    let SendOutcome::Confirmed(stored) = outcome else {
        panic!("send was not confirmed");
    };

    // The buyer's own subscription delivers the same message.
    let update = tokio::time::timeout(WAIT, buyer.next_update())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(update, ViewUpdate::Delivered(_)));

    assert_eq!(buyer.contents(), vec!["hello"]);
    assert!(buyer.with_timeline(|t| t.contains(&stored.id)));
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn transport_drop_is_recovered_from_history() {
    let h = Harness::new().await;
    let mut buyer = h.open_buyer_chat().await;
    let conversation_id = buyer.conversation_id();
    let mut seller = h.open_seller_chat(conversation_id).await;

    send(&mut buyer, "Is this available?").await;
    wait_for(&mut seller, "Is this available?").await;
    send(&mut seller, "Yes").await;
    let shown_before: Vec<MessageId> =
        seller.with_timeline(|t| t.messages().iter().map(|m| m.id).collect());
    assert_eq!(shown_before.len(), 2);

    h.transport.disconnect(&channel_for(&conversation_id)).await;
    // Sent while the channel is down; never pushed to the seller.
    h.service
        .send_message(command(conversation_id, "B1", "Still for sale?"))
        .await
        .unwrap();

    let updates = wait_for(&mut seller, "Still for sale?").await;

    assert!(updates.contains(&ViewUpdate::Resynced { added: 1 }));
    assert!(seller
        .with_timeline(|t| shown_before.iter().all(|id| t.contains(id))));
    assert_eq!(
        seller.contents(),
        vec!["Is this available?", "Yes", "Still for sale?"]
    );
    assert!(seller.is_live());
    // The buyer's subscription died with the channel and has not been renewed.
    assert_eq!(h.bus.subscriber_count(&conversation_id), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_are_delivered_in_commit_order() {
    let h = Harness::with_slow_first_delivery().await;
    let conversation_id = h
        .service
        .resolve_conversation(ResolveConversationCommand {
            product_id: product("P1"),
            client_id: user("B1"),
            seller_id: user("S1"),
        })
        .await
        .unwrap()
        .conversation
        .id();
    let recorder = Arc::new(SequenceRecorder::default());
    let handle = h
        .bus
        .subscribe(conversation_id, recorder.clone())
        .await
        .unwrap();

    let first = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .send_message(command(conversation_id, "B1", "first"))
                .await
                .unwrap()
                .sequence
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = h
        .service
        .send_message(command(conversation_id, "S1", "second"))
        .await
        .unwrap()
        .sequence;
    let first = first.await.unwrap();

    let deadline = tokio::time::Instant::now() + WAIT;
    while recorder.0.lock().unwrap().len() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(first < second);
    assert_eq!(*recorder.0.lock().unwrap(), vec![first, second]);
    h.bus.unsubscribe(&handle);
}

#[tokio::test]
async fn failed_write_rolls_back_the_echo() {
    let h = Harness::new().await;
    let mut buyer = h.open_buyer_chat().await;
    let mut seller = h.open_seller_chat(buyer.conversation_id()).await;
    h.store.fail_appends(true);

    buyer.set_draft("hi");
    let pending = buyer.submit().unwrap();
    assert_eq!(buyer.contents(), vec!["hi"]);

    let outcome = pending.complete().await;

    assert!(matches!(outcome, SendOutcome::Failed(ChatError::SendFailed(_))));
    assert!(buyer.contents().is_empty());
    assert!(!buyer.is_sending());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(seller.drain_updates().await.is_empty());

    h.store.fail_appends(false);
    assert!(matches!(send(&mut buyer, "hi again").await, SendOutcome::Confirmed(_)));
}

#[tokio::test]
async fn self_chat_is_rejected_before_resolution() {
    let h = Harness::new().await;

    let err = h
        .client
        .open_product_chat(user("S1"), product("P1"), user("S1"))
        .await
        .err()
        .unwrap();

    assert_eq!(err, ChatError::SelfChatRejected);
    assert_eq!(h.conversations.count().await, 0);
}

#[tokio::test]
async fn seller_inbox_reflects_the_exchange() {
    let h = Harness::new().await;
    let mut buyer = h.open_buyer_chat().await;
    send(&mut buyer, "Is this available?").await;
    send(&mut buyer, "I can pick it up today").await;

    let inbox = h
        .service
        .list_conversations(ListConversationsQuery {
            user_id: user("S1"),
            role: ParticipantRole::Seller,
        })
        .await
        .unwrap();

    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].product_name, "Road bike");
    assert_eq!(inbox[0].counterpart.label(), "Bea");
    assert_eq!(inbox[0].message_count, 2);
}

#[tokio::test]
async fn closing_views_releases_the_channel() {
    let h = Harness::new().await;
    let buyer = h.open_buyer_chat().await;
    let conversation_id = buyer.conversation_id();
    let mut seller = h.open_seller_chat(conversation_id).await;
    assert_eq!(h.bus.subscriber_count(&conversation_id), 2);

    drop(buyer);
    assert_eq!(h.bus.subscriber_count(&conversation_id), 1);

    seller.close();
    assert_eq!(h.bus.subscriber_count(&conversation_id), 0);
    assert_eq!(h.bus.active_channels(), 0);
}
