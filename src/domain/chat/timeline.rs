//! Optimistic message timeline for one conversation view.
//!
//! The timeline holds the canonical messages a viewer has seen plus at most one
//! locally rendered message awaiting its durable write. Pending entries are keyed
//! by a client [`CorrelationId`]; the store echoes that id on the canonical
//! message, so reconciliation is an exact key match.
//!
//! Per outgoing message: `Composing -> Optimistic -> {Confirmed | Failed}`.

use std::collections::HashSet;

use crate::domain::foundation::{CorrelationId, MessageId, Timestamp, UserId};

use super::{ChatError, Message, MessageContent};

/// A locally rendered message that has not been confirmed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Temporary identity; echoed back on the canonical message.
    pub correlation_id: CorrelationId,
    pub sender_id: UserId,
    pub content: MessageContent,
    /// Local clock at submit time.
    pub created_at: Timestamp,
}

/// One rendered row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEntry<'a> {
    Pending(&'a PendingMessage),
    Confirmed(&'a Message),
}

impl<'a> TimelineEntry<'a> {
    pub fn sender_id(&self) -> &'a UserId {
        match self {
            TimelineEntry::Pending(p) => &p.sender_id,
            TimelineEntry::Confirmed(m) => &m.sender_id,
        }
    }

    pub fn content(&self) -> &'a str {
        match self {
            TimelineEntry::Pending(p) => p.content.as_str(),
            TimelineEntry::Confirmed(m) => m.content.as_str(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TimelineEntry::Pending(_))
    }
}

/// What a reconciliation step did to the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// A pending entry was swapped for its canonical message.
    Replaced,
    /// The canonical message was inserted in order.
    Inserted,
    /// The canonical id was already shown; any pending twin was dropped.
    AlreadyShown,
    /// No pending entry matched; nothing changed.
    Ignored,
}

#[derive(Debug, Clone)]
struct InFlight {
    pending: PendingMessage,
    /// The bus delivered the canonical message before the write resolved.
    delivered: bool,
}

/// Ordered view state: canonical messages plus the in-flight echo.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    confirmed: Vec<Message>,
    shown: HashSet<MessageId>,
    in_flight: Option<InFlight>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `raw` and renders it locally as a pending entry.
    ///
    /// # Errors
    ///
    /// - `EmptyMessage` / `MessageTooLong` if content fails validation
    /// - `SendInFlight` if a previous send has not resolved
    pub fn begin_send(&mut self, sender: UserId, raw: &str) -> Result<PendingMessage, ChatError> {
        let content = MessageContent::new(raw)?;
        if self.in_flight.is_some() {
            return Err(ChatError::SendInFlight);
        }

        let pending = PendingMessage {
            correlation_id: CorrelationId::new(),
            sender_id: sender,
            content,
            created_at: Timestamp::now(),
        };
        self.in_flight = Some(InFlight {
            pending: pending.clone(),
            delivered: false,
        });
        Ok(pending)
    }

    /// Durable write succeeded for `correlation_id`.
    ///
    /// Always releases the in-flight guard for a matching send.
    pub fn confirm(&mut self, correlation_id: CorrelationId, message: Message) -> Reconciliation {
        let Some(in_flight) = self.take_in_flight(correlation_id) else {
            return if self.shown.contains(&message.id) {
                Reconciliation::AlreadyShown
            } else {
                Reconciliation::Ignored
            };
        };

        if in_flight.delivered || self.shown.contains(&message.id) {
            return Reconciliation::AlreadyShown;
        }
        self.insert_confirmed(message);
        Reconciliation::Replaced
    }

    /// Durable write failed: the echo is removed and never reaches history.
    ///
    /// Returns the rolled-back entry. `None` if nothing was pending under this
    /// id, or if the bus already proved the write durable.
    pub fn fail(&mut self, correlation_id: CorrelationId) -> Option<PendingMessage> {
        self.take_in_flight(correlation_id)
            .filter(|f| !f.delivered)
            .map(|f| f.pending)
    }

    /// Applies a message pushed by the delivery bus.
    pub fn apply_delivered(&mut self, message: Message) -> Reconciliation {
        if self.shown.contains(&message.id) {
            return Reconciliation::AlreadyShown;
        }

        let twin = match (self.in_flight.as_mut(), message.correlation_id) {
            (Some(f), Some(c)) if f.pending.correlation_id == c => Some(f),
            _ => None,
        };
        let outcome = match twin {
            Some(f) => {
                // Hidden, but the composer stays locked until the write resolves.
                f.delivered = true;
                Reconciliation::Replaced
            }
            None => Reconciliation::Inserted,
        };
        self.insert_confirmed(message);
        outcome
    }

    /// Merges a history fetch, adding every message not yet shown.
    ///
    /// Pending entries survive the merge. Returns the number of messages added.
    pub fn merge_history(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        let mut added = 0;
        for message in messages {
            if self.shown.contains(&message.id) {
                continue;
            }
            if let (Some(f), Some(c)) = (self.in_flight.as_mut(), message.correlation_id) {
                if f.pending.correlation_id == c {
                    f.delivered = true;
                }
            }
            self.insert_confirmed(message);
            added += 1;
        }
        added
    }

    /// Whether a send is awaiting its outcome.
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.shown.contains(id)
    }

    /// Canonical messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.confirmed
    }

    /// The echo currently rendered, if any.
    pub fn pending(&self) -> Option<&PendingMessage> {
        self.in_flight
            .as_ref()
            .filter(|f| !f.delivered)
            .map(|f| &f.pending)
    }

    /// All rows in display order; the pending echo renders last.
    pub fn entries(&self) -> impl Iterator<Item = TimelineEntry<'_>> {
        self.confirmed
            .iter()
            .map(TimelineEntry::Confirmed)
            .chain(self.pending().map(TimelineEntry::Pending))
    }

    pub fn len(&self) -> usize {
        self.confirmed.len() + usize::from(self.pending().is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_in_flight(&mut self, correlation_id: CorrelationId) -> Option<InFlight> {
        let matches = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.pending.correlation_id == correlation_id);
        if matches {
            self.in_flight.take()
        } else {
            None
        }
    }

    fn insert_confirmed(&mut self, message: Message) {
        let at = self
            .confirmed
            .partition_point(|m| m.canonical_cmp(&message).is_le());
        self.shown.insert(message.id);
        self.confirmed.insert(at, message);
    }
}
