//! Conversation identity and aggregate.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConversationId, ProductId, Timestamp, UserId};

use super::ChatError;

/// Which side of a conversation a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// Matched against `client_id`.
    Buyer,
    /// Matched against `seller_id`.
    Seller,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Buyer => "buyer",
            ParticipantRole::Seller => "seller",
        }
    }
}

impl std::str::FromStr for ParticipantRole {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" | "client" => Ok(ParticipantRole::Buyer),
            "seller" => Ok(ParticipantRole::Seller),
            other => Err(ChatError::invalid_participants(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

/// The unique identity of a conversation: one product, one buyer, one seller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    product_id: ProductId,
    client_id: UserId,
    seller_id: UserId,
}

impl ConversationKey {
    /// Builds a key, rejecting a buyer chatting with themself as seller.
    pub fn new(
        product_id: ProductId,
        client_id: UserId,
        seller_id: UserId,
    ) -> Result<Self, ChatError> {
        if client_id == seller_id {
            return Err(ChatError::SelfChatRejected);
        }
        Ok(Self {
            product_id,
            client_id,
            seller_id,
        })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn client_id(&self) -> &UserId {
        &self.client_id
    }

    pub fn seller_id(&self) -> &UserId {
        &self.seller_id
    }
}

/// A deduplicated (product, buyer, seller) chat session.
///
/// Never deleted and never re-keyed once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    id: ConversationId,
    key: ConversationKey,
    created_at: Timestamp,
}

impl Conversation {
    /// Starts a new conversation for the given key.
    pub fn start(key: ConversationKey) -> Self {
        Self {
            id: ConversationId::new(),
            key,
            created_at: Timestamp::now(),
        }
    }

    /// Rebuilds a conversation from storage.
    pub fn reconstitute(id: ConversationId, key: ConversationKey, created_at: Timestamp) -> Self {
        Self {
            id,
            key,
            created_at,
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn product_id(&self) -> &ProductId {
        self.key.product_id()
    }

    pub fn client_id(&self) -> &UserId {
        self.key.client_id()
    }

    pub fn seller_id(&self) -> &UserId {
        self.key.seller_id()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns true if the user is the buyer or the seller.
    pub fn involves(&self, user: &UserId) -> bool {
        self.role_of(user).is_some()
    }

    pub fn role_of(&self, user: &UserId) -> Option<ParticipantRole> {
        if user == self.client_id() {
            Some(ParticipantRole::Buyer)
        } else if user == self.seller_id() {
            Some(ParticipantRole::Seller)
        } else {
            None
        }
    }

    /// The other party from the given user's point of view.
    pub fn counterpart_of(&self, user: &UserId) -> Option<&UserId> {
        match self.role_of(user)? {
            ParticipantRole::Buyer => Some(self.seller_id()),
            ParticipantRole::Seller => Some(self.client_id()),
        }
    }
}
