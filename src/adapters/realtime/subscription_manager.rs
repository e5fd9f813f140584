//! Reference-counted subscription registry over a realtime transport.
//!
//! # Architecture
//!
//! ```text
//! conversation C1 ── chat:C1 stream ── pump task ──┬── listener a
//!                                                  └── listener b
//! conversation C2 ── chat:C2 stream ── pump task ───── listener c
//! ```
//!
//! The first subscriber for a conversation opens its transport channel and
//! spawns one pump task; the last unsubscribe aborts the pump, which closes
//! the channel. The pump delivers events one at a time while holding the
//! channel's subscriber lock, and `unsubscribe` removes listeners under that
//! same lock, so a listener is never called after `unsubscribe` returns.
//!
//! A transport drop degrades every subscriber of that channel and discards the
//! entry. Existing handles become inert; callers re-subscribe and re-fetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::domain::chat::ChatError;
use crate::domain::foundation::ConversationId;
use crate::ports::{
    channel_for, DeliveryBus, DeliveryEvent, DeliveryListener, RealtimeTransport,
    SubscriptionHandle, TransportSignal, TransportStream,
};

struct Subscriber {
    id: u64,
    listener: Arc<dyn DeliveryListener>,
}

type Subscribers = Arc<Mutex<Vec<Subscriber>>>;

struct ChannelEntry {
    generation: u64,
    subscribers: Subscribers,
    pump: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<ConversationId, ChannelEntry>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `DeliveryBus` implementation shared by every view in the process.
pub struct SubscriptionManager {
    transport: Arc<dyn RealtimeTransport>,
    registry: Registry,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self {
            transport,
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of conversations with an open channel.
    pub fn active_channels(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Number of subscribers attached to a conversation.
    pub fn subscriber_count(&self, conversation_id: &ConversationId) -> usize {
        lock(&self.registry)
            .get(conversation_id)
            .map(|entry| lock(&entry.subscribers).len())
            .unwrap_or(0)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Attach to an existing channel entry, if there is one.
    fn join_existing(
        &self,
        conversation_id: ConversationId,
        subscriber: Subscriber,
    ) -> Result<SubscriptionHandle, Subscriber> {
        let registry = lock(&self.registry);
        match registry.get(&conversation_id) {
            Some(entry) => {
                let handle = SubscriptionHandle::new(conversation_id, subscriber.id);
                lock(&entry.subscribers).push(subscriber);
                Ok(handle)
            }
            None => Err(subscriber),
        }
    }

    fn spawn_pump(
        &self,
        conversation_id: ConversationId,
        generation: u64,
        subscribers: Subscribers,
        stream: TransportStream,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(pump(registry, conversation_id, generation, subscribers, stream))
    }
}

async fn pump(
    registry: Registry,
    conversation_id: ConversationId,
    generation: u64,
    subscribers: Subscribers,
    mut stream: TransportStream,
) {
    let reason = loop {
        match stream.next().await {
            Some(TransportSignal::Event(event)) => {
                if event.conversation_id != conversation_id {
                    continue;
                }
                let subscribers = lock(&subscribers);
                for subscriber in subscribers.iter() {
                    subscriber
                        .listener
                        .on_event(DeliveryEvent::Message(event.message.clone()));
                }
            }
            Some(TransportSignal::Dropped { reason }) => break reason,
            None => break "transport stream ended".to_string(),
        }
    };

    tracing::warn!(
        conversation_id = %conversation_id,
        reason = %reason,
        "Realtime channel dropped, degrading subscribers"
    );

    {
        let mut registry = lock(&registry);
        if registry
            .get(&conversation_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            registry.remove(&conversation_id);
        }
    }

    let mut subscribers = lock(&subscribers);
    for subscriber in subscribers.iter() {
        subscriber.listener.on_event(DeliveryEvent::Degraded {
            reason: reason.clone(),
        });
    }
    subscribers.clear();
}

#[async_trait]
impl DeliveryBus for SubscriptionManager {
    async fn subscribe(
        &self,
        conversation_id: ConversationId,
        listener: Arc<dyn DeliveryListener>,
    ) -> Result<SubscriptionHandle, ChatError> {
        let subscriber = Subscriber {
            id: self.next_id(),
            listener,
        };
        let subscriber = match self.join_existing(conversation_id, subscriber) {
            Ok(handle) => return Ok(handle),
            Err(subscriber) => subscriber,
        };

        let channel = channel_for(&conversation_id);
        let stream = self.transport.open(&channel).await.map_err(|e| {
            tracing::warn!(channel = %channel, error = %e, "Failed to open realtime channel");
            ChatError::subscription_degraded(e.message)
        })?;

        let mut registry = lock(&self.registry);
        let handle = SubscriptionHandle::new(conversation_id, subscriber.id);
        if let Some(entry) = registry.get(&conversation_id) {
            // Lost the race to open; the extra stream closes when dropped.
            lock(&entry.subscribers).push(subscriber);
            return Ok(handle);
        }

        let generation = self.next_id();
        let subscribers: Subscribers = Arc::new(Mutex::new(vec![subscriber]));
        let pump = self.spawn_pump(
            conversation_id,
            generation,
            Arc::clone(&subscribers),
            stream,
        );
        registry.insert(
            conversation_id,
            ChannelEntry {
                generation,
                subscribers,
                pump,
            },
        );
        tracing::debug!(channel = %channel, "Opened realtime channel");
        Ok(handle)
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let conversation_id = handle.conversation_id();
        let mut registry = lock(&self.registry);
        let Some(entry) = registry.get(&conversation_id) else {
            return;
        };

        let now_empty = {
            let mut subscribers = lock(&entry.subscribers);
            let before = subscribers.len();
            subscribers.retain(|s| s.id != handle.subscriber_id());
            if subscribers.len() == before {
                return;
            }
            subscribers.is_empty()
        };

        if now_empty {
            if let Some(entry) = registry.remove(&conversation_id) {
                entry.pump.abort();
                tracing::debug!(conversation_id = %conversation_id, "Closed realtime channel");
            }
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        for (_, entry) in lock(&self.registry).drain() {
            entry.pump.abort();
        }
    }
}
