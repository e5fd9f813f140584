//! PostgreSQL implementation of MessageStore.
//!
//! Appends lock the owning conversation row, so within one conversation
//! `sequence` and `created_at` both follow commit order. A repeated
//! `(conversation_id, correlation_id)` returns the stored row.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::chat::{Message, MessageContent, NewMessage};
use crate::domain::foundation::{
    ConversationId, CorrelationId, DomainError, ErrorCode, MessageId, Timestamp, UserId,
};
use crate::ports::MessageStore;

use super::conversation_repository::db_error;

/// PostgreSQL implementation of MessageStore.
#[derive(Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    /// Creates a new PostgresMessageStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sequence, sender_id, content, correlation_id, created_at";

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn append(&self, new: NewMessage) -> Result<Message, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to start transaction", e))?;

        let locked = sqlx::query("SELECT id FROM chat_conversations WHERE id = $1 FOR UPDATE")
            .bind(new.conversation_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to lock conversation", e))?;
        if locked.is_none() {
            return Err(DomainError::new(
                ErrorCode::ConversationNotFound,
                format!("Conversation not found: {}", new.conversation_id),
            ));
        }

        if let Some(correlation_id) = new.correlation_id {
            let existing = sqlx::query(&format!(
                "SELECT {} FROM chat_messages WHERE conversation_id = $1 AND correlation_id = $2",
                MESSAGE_COLUMNS
            ))
            .bind(new.conversation_id.as_uuid())
            .bind(correlation_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to look up correlation id", e))?;

            if let Some(row) = existing {
                tx.commit()
                    .await
                    .map_err(|e| db_error("Failed to commit transaction", e))?;
                return row_to_message(row);
            }
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO chat_messages (id, conversation_id, sender_id, content, correlation_id, created_at)
            VALUES (
                $1, $2, $3, $4, $5,
                GREATEST(
                    clock_timestamp(),
                    COALESCE(
                        (SELECT max(created_at) FROM chat_messages WHERE conversation_id = $2),
                        '-infinity'::timestamptz
                    )
                )
            )
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(MessageId::new().as_uuid())
        .bind(new.conversation_id.as_uuid())
        .bind(new.sender_id.as_str())
        .bind(new.content.as_str())
        .bind(new.correlation_id.map(|c| *c.as_uuid()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert message", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        row_to_message(row)
    }

    async fn list(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chat_messages WHERE conversation_id = $1 ORDER BY created_at ASC, sequence ASC",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list messages", e))?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn count_by_conversation(
        &self,
        conversation_ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, u64>, DomainError> {
        if conversation_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<uuid::Uuid> = conversation_ids.iter().map(|id| *id.as_uuid()).collect();

        let rows = sqlx::query(
            r#"
            SELECT conversation_id, COUNT(*) AS message_count
            FROM chat_messages
            WHERE conversation_id = ANY($1)
            GROUP BY conversation_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count messages", e))?;

        rows.into_iter()
            .map(|row| {
                let id: uuid::Uuid = row
                    .try_get("conversation_id")
                    .map_err(|e| db_error("Failed to get conversation_id", e))?;
                let count: i64 = row
                    .try_get("message_count")
                    .map_err(|e| db_error("Failed to get message_count", e))?;
                Ok((ConversationId::from_uuid(id), count.max(0) as u64))
            })
            .collect()
    }
}

fn row_to_message(row: sqlx::postgres::PgRow) -> Result<Message, DomainError> {
    let id: uuid::Uuid = row
        .try_get("id")
        .map_err(|e| db_error("Failed to get id", e))?;
    let conversation_id: uuid::Uuid = row
        .try_get("conversation_id")
        .map_err(|e| db_error("Failed to get conversation_id", e))?;
    let sequence: i64 = row
        .try_get("sequence")
        .map_err(|e| db_error("Failed to get sequence", e))?;
    let sender_id: String = row
        .try_get("sender_id")
        .map_err(|e| db_error("Failed to get sender_id", e))?;
    let content: String = row
        .try_get("content")
        .map_err(|e| db_error("Failed to get content", e))?;
    let correlation_id: Option<uuid::Uuid> = row
        .try_get("correlation_id")
        .map_err(|e| db_error("Failed to get correlation_id", e))?;
    let created_at: chrono::DateTime<chrono::Utc> = row
        .try_get("created_at")
        .map_err(|e| db_error("Failed to get created_at", e))?;

    let invalid = |field: &str, reason: String| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid stored message {}: {}", field, reason),
        )
        .with_detail("message_id", id.to_string())
    };

    Ok(Message {
        id: MessageId::from_uuid(id),
        conversation_id: ConversationId::from_uuid(conversation_id),
        sender_id: UserId::new(sender_id).map_err(|e| invalid("sender_id", e.to_string()))?,
        content: MessageContent::new(content).map_err(|e| invalid("content", e.to_string()))?,
        created_at: Timestamp::from_datetime(created_at),
        sequence,
        correlation_id: correlation_id.map(CorrelationId::from_uuid),
    })
}
