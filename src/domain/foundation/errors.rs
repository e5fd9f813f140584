//! Error types shared across layers.
//!
//! `ValidationError` comes from value-object constructors. `DomainError` is
//! what ports return; handlers translate it into `ChatError` at their edge.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' exceeds maximum length of {max}, got {actual}")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },
}

impl ValidationError {
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    pub fn too_long(field: impl Into<String>, max: usize, actual: usize) -> Self {
        ValidationError::TooLong {
            field: field.into(),
            max,
            actual,
        }
    }
}

/// Stable machine-readable codes. The `Display` form goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Rejected input
    EmptyMessage,
    MessageTooLong,
    SelfChatRejected,
    InvalidParticipants,
    SendInFlight,

    // Lookup and access
    ConversationNotFound,
    Forbidden,

    // Chat pipeline stages
    ResolutionFailed,
    HistoryLoadFailed,
    SubscriptionDegraded,
    SendFailed,
    ViewClosed,

    // Infrastructure
    DatabaseError,
    TransportError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EmptyMessage => "EMPTY_MESSAGE",
            ErrorCode::MessageTooLong => "MESSAGE_TOO_LONG",
            ErrorCode::SelfChatRejected => "SELF_CHAT_REJECTED",
            ErrorCode::InvalidParticipants => "INVALID_PARTICIPANTS",
            ErrorCode::SendInFlight => "SEND_IN_FLIGHT",
            ErrorCode::ConversationNotFound => "CONVERSATION_NOT_FOUND",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::ResolutionFailed => "RESOLUTION_FAILED",
            ErrorCode::HistoryLoadFailed => "HISTORY_LOAD_FAILED",
            ErrorCode::SubscriptionDegraded => "SUBSCRIPTION_DEGRADED",
            ErrorCode::SendFailed => "SEND_FAILED",
            ErrorCode::ViewClosed => "VIEW_CLOSED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::TransportError => "TRANSPORT_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by an adapter.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    /// Extra context for logs, e.g. the row id that failed to decode.
    pub details: HashMap<String, String>,
}

impl DomainError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
