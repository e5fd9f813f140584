//! PostgreSQL implementation of ConversationRepository.
//!
//! Uniqueness of the (product, buyer, seller) key is enforced by the
//! `chat_conversations_key` constraint; inserts use `ON CONFLICT DO NOTHING`
//! and report which caller won.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::chat::{Conversation, ConversationKey, ParticipantRole};
use crate::domain::foundation::{
    ConversationId, DomainError, ErrorCode, ProductId, Timestamp, UserId,
};
use crate::ports::{ConversationRepository, InsertOutcome};

/// PostgreSQL implementation of ConversationRepository.
#[derive(Clone)]
pub struct PostgresConversationRepository {
    pool: PgPool,
}

impl PostgresConversationRepository {
    /// Creates a new PostgresConversationRepository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn find_by_key(&self, key: &ConversationKey) -> Result<Option<Conversation>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, client_id, seller_id, created_at
            FROM chat_conversations
            WHERE product_id = $1 AND client_id = $2 AND seller_id = $3
            "#,
        )
        .bind(key.product_id().as_str())
        .bind(key.client_id().as_str())
        .bind(key.seller_id().as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find conversation by key", e))?;

        row.map(row_to_conversation).transpose()
    }

    async fn insert(&self, conversation: &Conversation) -> Result<InsertOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO chat_conversations (id, product_id, client_id, seller_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT chat_conversations_key DO NOTHING
            "#,
        )
        .bind(conversation.id().as_uuid())
        .bind(conversation.product_id().as_str())
        .bind(conversation.client_id().as_str())
        .bind(conversation.seller_id().as_str())
        .bind(conversation.created_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert conversation", e))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn find_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, client_id, seller_id, created_at
            FROM chat_conversations
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find conversation", e))?;

        row.map(row_to_conversation).transpose()
    }

    async fn list_for_participant(
        &self,
        user: &UserId,
        role: ParticipantRole,
    ) -> Result<Vec<Conversation>, DomainError> {
        let sql = match role {
            ParticipantRole::Buyer => {
                r#"
                SELECT id, product_id, client_id, seller_id, created_at
                FROM chat_conversations
                WHERE client_id = $1
                ORDER BY created_at DESC, id DESC
                "#
            }
            ParticipantRole::Seller => {
                r#"
                SELECT id, product_id, client_id, seller_id, created_at
                FROM chat_conversations
                WHERE seller_id = $1
                ORDER BY created_at DESC, id DESC
                "#
            }
        };

        let rows = sqlx::query(sql)
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list conversations", e))?;

        rows.into_iter().map(row_to_conversation).collect()
    }
}

pub(super) fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

fn row_to_conversation(row: sqlx::postgres::PgRow) -> Result<Conversation, DomainError> {
    let id: uuid::Uuid = row
        .try_get("id")
        .map_err(|e| db_error("Failed to get id", e))?;
    let product_id: String = row
        .try_get("product_id")
        .map_err(|e| db_error("Failed to get product_id", e))?;
    let client_id: String = row
        .try_get("client_id")
        .map_err(|e| db_error("Failed to get client_id", e))?;
    let seller_id: String = row
        .try_get("seller_id")
        .map_err(|e| db_error("Failed to get seller_id", e))?;
    let created_at: chrono::DateTime<chrono::Utc> = row
        .try_get("created_at")
        .map_err(|e| db_error("Failed to get created_at", e))?;

    let corrupt = |field: &str, reason: String| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid stored conversation {}: {}", field, reason),
        )
        .with_detail("conversation_id", id.to_string())
    };

    let key = ConversationKey::new(
        ProductId::new(product_id).map_err(|e| corrupt("product_id", e.to_string()))?,
        UserId::new(client_id).map_err(|e| corrupt("client_id", e.to_string()))?,
        UserId::new(seller_id).map_err(|e| corrupt("seller_id", e.to_string()))?,
    )
    .map_err(|e| corrupt("key", e.to_string()))?;

    Ok(Conversation::reconstitute(
        ConversationId::from_uuid(id),
        key,
        Timestamp::from_datetime(created_at),
    ))
}
