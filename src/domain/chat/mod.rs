//! Buyer/seller chat domain.
//!
//! - `conversation` - Conversation aggregate and its (product, buyer, seller) key
//! - `message` - Message value types and canonical ordering
//! - `timeline` - Optimistic send state for one view
//! - `summary` - Read-model projections for history and inbox
//! - `events` - Domain events published by the send and resolve flows

mod conversation;
mod errors;
mod events;
pub(crate) mod message;
mod summary;
mod timeline;

pub use conversation::{Conversation, ConversationKey, ParticipantRole};
pub use errors::ChatError;
pub use events::{ConversationStarted, MessageInserted, CONVERSATION_STARTED, MESSAGE_INSERTED};
pub use message::{sort_canonical, Message, MessageContent, NewMessage};
pub use summary::{
    ConversationSummary, EnrichedMessage, ProductSummary, ProfileSummary, UNKNOWN_DISPLAY_NAME,
    UNKNOWN_PRODUCT_NAME,
};
pub use timeline::{PendingMessage, Reconciliation, Timeline, TimelineEntry};
