//! Conversation repository port.
//!
//! The repository is the sole arbiter of conversation uniqueness: at most one
//! row exists per (product, buyer, seller) key, however many callers race to
//! create it.

use crate::domain::chat::{Conversation, ConversationKey, ParticipantRole};
use crate::domain::foundation::{ConversationId, DomainError, UserId};
use async_trait::async_trait;

/// Result of a constrained-unique insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call created the row.
    Inserted,
    /// Another row already holds the key; nothing was written.
    AlreadyExists,
}

/// Repository port for conversations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find the conversation for a key, if one exists.
    async fn find_by_key(&self, key: &ConversationKey) -> Result<Option<Conversation>, DomainError>;

    /// Insert a conversation unless its key is already taken.
    ///
    /// Must be atomic with respect to the key: of any number of concurrent
    /// inserts for one key, exactly one reports `Inserted`.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, conversation: &Conversation) -> Result<InsertOutcome, DomainError>;

    /// Find a conversation by id.
    async fn find_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, DomainError>;

    /// All conversations where `user` holds `role`, newest first.
    async fn list_for_participant(
        &self,
        user: &UserId,
        role: ParticipantRole,
    ) -> Result<Vec<Conversation>, DomainError>;
}
