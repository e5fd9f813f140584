//! Client-side chat view: one open conversation window.
//!
//! A view subscribes to the delivery bus before fetching history, renders its
//! own sends optimistically, and reconciles them by correlation id. Bus events
//! are queued and applied when the owner polls [`ChatView::next_update`], so
//! all timeline mutation happens on the owner's task or inside a
//! [`PendingSend`] completion.
//!
//! ```ignore
//! let client = ChatClient::new(gateway, bus, config.chat.clone());
//! let mut view = client.open_product_chat(buyer, product_id, seller_id).await?;
//! view.set_draft("Is this available?");
//! let send = view.submit()?;           // echo rendered, draft cleared
//! tokio::spawn(send.complete());        // durable write + reconcile
//! while let Some(update) = view.next_update().await { /* re-render */ }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::config::ChatConfig;
use crate::domain::chat::{ChatError, Message, PendingMessage, Reconciliation, Timeline};
use crate::domain::foundation::{ConversationId, CorrelationId, ProductId, UserId};
use crate::ports::{ChatGateway, DeliveryBus, DeliveryEvent, DeliveryListener, SubscriptionHandle};

/// Opens chat views over a gateway and a delivery bus.
#[derive(Clone)]
pub struct ChatClient {
    gateway: Arc<dyn ChatGateway>,
    bus: Arc<dyn DeliveryBus>,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(gateway: Arc<dyn ChatGateway>, bus: Arc<dyn DeliveryBus>, config: ChatConfig) -> Self {
        Self {
            gateway,
            bus,
            config,
        }
    }

    /// Buyer entry point from a product page: resolve, then open.
    ///
    /// Self-chat is rejected here, before the resolver is called.
    pub async fn open_product_chat(
        &self,
        buyer: UserId,
        product_id: ProductId,
        seller_id: UserId,
    ) -> Result<ChatView, ChatError> {
        if buyer == seller_id {
            return Err(ChatError::SelfChatRejected);
        }
        let conversation = self
            .gateway
            .resolve(product_id, buyer.clone(), seller_id)
            .await?;
        self.open_conversation(buyer, conversation.id()).await
    }

    /// Opens a known conversation, e.g. from the inbox.
    pub async fn open_conversation(
        &self,
        viewer: UserId,
        conversation_id: ConversationId,
    ) -> Result<ChatView, ChatError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Arc::new(QueueListener { tx });

        let handle = self
            .bus
            .subscribe(conversation_id, listener.clone())
            .await?;

        let mut view = ChatView {
            gateway: self.gateway.clone(),
            bus: self.bus.clone(),
            restore_draft_on_failure: self.config.restore_draft_on_failure,
            viewer,
            conversation_id,
            state: Arc::new(Mutex::new(ViewState::default())),
            subscription: Some(handle),
            listener,
            events: rx,
        };

        // Dropping the view on failure releases the subscription.
        view.reload().await?;
        Ok(view)
    }
}

/// Forwards bus events into the view's queue.
struct QueueListener {
    tx: mpsc::UnboundedSender<DeliveryEvent>,
}

impl DeliveryListener for QueueListener {
    fn on_event(&self, event: DeliveryEvent) {
        // Receiver gone means the view is closed.
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Default)]
struct ViewState {
    timeline: Timeline,
    draft: String,
    closed: bool,
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What changed after processing one queued bus event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// A pushed message was applied.
    Delivered(Reconciliation),
    /// The subscription dropped and was re-established; `added` messages
    /// were recovered from history.
    Resynced { added: usize },
    /// Recovery failed. The view keeps what it has; call
    /// [`ChatView::reconnect`] to try again.
    Degraded(ChatError),
}

/// How a send ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The store holds the message; the echo was replaced or merged.
    Confirmed(Message),
    /// The echo was rolled back.
    Failed(ChatError),
    /// The view was closed before the write resolved; nothing was updated.
    Detached,
}

/// One open conversation window.
pub struct ChatView {
    gateway: Arc<dyn ChatGateway>,
    bus: Arc<dyn DeliveryBus>,
    restore_draft_on_failure: bool,
    viewer: UserId,
    conversation_id: ConversationId,
    state: Arc<Mutex<ViewState>>,
    subscription: Option<SubscriptionHandle>,
    listener: Arc<QueueListener>,
    events: mpsc::UnboundedReceiver<DeliveryEvent>,
}

impl ChatView {
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    pub fn draft(&self) -> String {
        lock(&self.state).draft.clone()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        lock(&self.state).draft = text.into();
    }

    /// Whether the composer is locked by an unresolved send.
    pub fn is_sending(&self) -> bool {
        lock(&self.state).timeline.is_sending()
    }

    /// Runs `f` against the current timeline.
    pub fn with_timeline<R>(&self, f: impl FnOnce(&Timeline) -> R) -> R {
        f(&lock(&self.state).timeline)
    }

    /// Rendered contents in display order, pending echo last.
    pub fn contents(&self) -> Vec<String> {
        self.with_timeline(|t| t.entries().map(|e| e.content().to_string()).collect())
    }

    /// Whether the view currently holds a live subscription.
    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    /// Moves the draft into the timeline as an optimistic echo.
    ///
    /// Happens before any I/O. On a validation error or while another send
    /// is in flight the draft is left untouched.
    pub fn submit(&mut self) -> Result<PendingSend, ChatError> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.closed {
            return Err(ChatError::ViewClosed);
        }

        let pending = state
            .timeline
            .begin_send(self.viewer.clone(), &state.draft)?;
        state.draft.clear();

        Ok(PendingSend {
            gateway: self.gateway.clone(),
            state: self.state.clone(),
            conversation_id: self.conversation_id,
            restore_draft_on_failure: self.restore_draft_on_failure,
            pending,
        })
    }

    /// Re-fetches history and merges anything not yet shown.
    ///
    /// A failure leaves the subscription and the timeline as they were.
    pub async fn reload(&mut self) -> Result<usize, ChatError> {
        let history = self
            .gateway
            .history(self.conversation_id, self.viewer.clone())
            .await?;
        let mut state = lock(&self.state);
        Ok(state
            .timeline
            .merge_history(history.into_iter().map(|enriched| enriched.message)))
    }

    /// Re-subscribes (if needed) and closes the gap from history.
    pub async fn reconnect(&mut self) -> Result<usize, ChatError> {
        if self.subscription.is_none() {
            let handle = self
                .bus
                .subscribe(self.conversation_id, self.listener.clone())
                .await?;
            self.subscription = Some(handle);
        }
        self.reload().await
    }

    /// Waits for the next bus event and applies it.
    ///
    /// Returns `None` once the view is closed.
    pub async fn next_update(&mut self) -> Option<ViewUpdate> {
        if lock(&self.state).closed {
            return None;
        }
        let event = self.events.recv().await?;
        Some(self.apply(event).await)
    }

    /// Applies every event already queued without waiting for more.
    pub async fn drain_updates(&mut self) -> Vec<ViewUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            updates.push(self.apply(event).await);
        }
        updates
    }

    async fn apply(&mut self, event: DeliveryEvent) -> ViewUpdate {
        match event {
            DeliveryEvent::Message(message) => {
                ViewUpdate::Delivered(lock(&self.state).timeline.apply_delivered(message))
            }
            DeliveryEvent::Degraded { reason } => {
                tracing::warn!(conversation_id = %self.conversation_id, %reason, "chat subscription degraded, resyncing");
                // The old handle is inert.
                self.subscription = None;
                match self.reconnect().await {
                    Ok(added) => ViewUpdate::Resynced { added },
                    Err(err) => ViewUpdate::Degraded(err),
                }
            }
        }
    }

    /// Tears the view down. In-flight sends still complete, but their
    /// reconciliation becomes a no-op. Safe to call more than once.
    pub fn close(&mut self) {
        lock(&self.state).closed = true;
        if let Some(handle) = self.subscription.take() {
            self.bus.unsubscribe(&handle);
        }
        self.events.close();
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.close();
    }
}

/// An optimistic send awaiting its durable write.
#[must_use = "the message is only sent when `complete` is awaited"]
pub struct PendingSend {
    gateway: Arc<dyn ChatGateway>,
    state: Arc<Mutex<ViewState>>,
    conversation_id: ConversationId,
    restore_draft_on_failure: bool,
    pending: PendingMessage,
}

impl PendingSend {
    pub fn correlation_id(&self) -> CorrelationId {
        self.pending.correlation_id
    }

    pub fn pending(&self) -> &PendingMessage {
        &self.pending
    }

    /// Writes the message through the gateway and reconciles the view.
    pub async fn complete(self) -> SendOutcome {
        let correlation_id = self.pending.correlation_id;
        let result = self
            .gateway
            .send(
                self.conversation_id,
                self.pending.sender_id.clone(),
                self.pending.content.as_str().to_string(),
                correlation_id,
            )
            .await;

        let mut state = lock(&self.state);
        if state.closed {
            return SendOutcome::Detached;
        }

        match result {
            Ok(message) => {
                state.timeline.confirm(correlation_id, message.clone());
                SendOutcome::Confirmed(message)
            }
            Err(err) => self.rollback(&mut state, err),
        }
    }

    fn rollback(&self, state: &mut ViewState, err: ChatError) -> SendOutcome {
        let correlation_id = self.pending.correlation_id;
        match state.timeline.fail(correlation_id) {
            Some(rolled_back) => {
                if self.restore_draft_on_failure && state.draft.trim().is_empty() {
                    state.draft = rolled_back.content.to_string();
                }
                let err = match err {
                    ChatError::SendFailed(_) => err,
                    other => ChatError::send_failed(other.to_string()),
                };
                tracing::debug!(conversation_id = %self.conversation_id, error = %err, "optimistic send rolled back");
                SendOutcome::Failed(err)
            }
            // The bus already delivered it, so the write did land.
            None => match state
                .timeline
                .messages()
                .iter()
                .find(|m| m.correlation_id == Some(correlation_id))
            {
                Some(message) => SendOutcome::Confirmed(message.clone()),
                None => SendOutcome::Failed(ChatError::send_failed(err.to_string())),
            },
        }
    }
}
