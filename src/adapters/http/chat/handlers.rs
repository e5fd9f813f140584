//! HTTP handlers for chat endpoints.
//!
//! These handlers connect Axum routes to the `ChatService`.

use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::chat::{
    ListConversationsQuery, ListMessagesQuery, ResolveConversationCommand, SendMessageCommand,
};
use crate::application::ChatService;
use crate::domain::chat::ChatError;
use crate::domain::foundation::{ConversationId, ProductId, UserId};
use crate::ports::DeliveryBus;

use super::dto::{
    ConversationResponse, ConversationSummaryResponse, ErrorResponse, ListConversationsParams,
    MessageResponse, ResolveConversationRequest, SendMessageRequest,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the chat routes.
#[derive(Clone)]
pub struct ChatAppState {
    pub service: Arc<ChatService>,
    /// Live subscriptions for the WebSocket endpoint.
    pub bus: Arc<dyn DeliveryBus>,
}

impl ChatAppState {
    pub fn new(service: Arc<ChatService>, bus: Arc<dyn DeliveryBus>) -> Self {
        Self { service, bus }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/conversations/resolve - Find or create the caller's chat about a product
pub async fn resolve_conversation(
    State(state): State<ChatAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ResolveConversationRequest>,
) -> Result<Response, ChatApiError> {
    let product_id = ProductId::new(request.product_id)
        .map_err(|e| ChatApiError::BadRequest(e.to_string()))?;
    let seller_id =
        UserId::new(request.seller_id).map_err(|e| ChatApiError::BadRequest(e.to_string()))?;

    let resolved = state
        .service
        .resolve_conversation(ResolveConversationCommand {
            product_id,
            client_id: user.id,
            seller_id,
        })
        .await?;

    let status = if resolved.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ConversationResponse::from(resolved))).into_response())
}

/// GET /api/conversations?role=buyer|seller - The caller's inbox
pub async fn list_conversations(
    State(state): State<ChatAppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<ListConversationsParams>,
) -> Result<Json<Vec<ConversationSummaryResponse>>, ChatApiError> {
    let summaries = state
        .service
        .list_conversations(ListConversationsQuery {
            user_id: user.id,
            role: params.role,
        })
        .await?;

    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

/// GET /api/conversations/:id/messages - Ordered history
pub async fn list_messages(
    State(state): State<ChatAppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ChatApiError> {
    let conversation_id = parse_conversation_id(&id)?;

    let history = state
        .service
        .list_messages(ListMessagesQuery {
            conversation_id,
            viewer: user.id,
        })
        .await?;

    Ok(Json(history.into_iter().map(Into::into).collect()))
}

/// POST /api/conversations/:id/messages - Send a message
pub async fn send_message(
    State(state): State<ChatAppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, ChatApiError> {
    let conversation_id = parse_conversation_id(&id)?;

    let message = state
        .service
        .send_message(SendMessageCommand {
            conversation_id,
            sender_id: user.id,
            content: request.content,
            correlation_id: request.correlation_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))).into_response())
}

pub(super) fn parse_conversation_id(raw: &str) -> Result<ConversationId, ChatApiError> {
    raw.parse()
        .map_err(|_| ChatApiError::BadRequest("Invalid conversation ID".to_string()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════════

/// Error returned by chat handlers.
#[derive(Debug)]
pub enum ChatApiError {
    Chat(ChatError),
    BadRequest(String),
}

impl From<ChatError> for ChatApiError {
    fn from(err: ChatError) -> Self {
        ChatApiError::Chat(err)
    }
}

/// HTTP status for each chat error.
pub fn status_for(error: &ChatError) -> StatusCode {
    match error {
        ChatError::SelfChatRejected
        | ChatError::EmptyMessage
        | ChatError::MessageTooLong { .. } => StatusCode::BAD_REQUEST,
        ChatError::InvalidParticipants(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ChatError::ConversationNotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Forbidden => StatusCode::FORBIDDEN,
        ChatError::SendInFlight => StatusCode::CONFLICT,
        ChatError::ViewClosed => StatusCode::GONE,
        ChatError::ResolutionFailed(_)
        | ChatError::HistoryLoadFailed(_)
        | ChatError::SubscriptionDegraded(_)
        | ChatError::SendFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ChatApiError {
    fn into_response(self) -> Response {
        match self {
            ChatApiError::Chat(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::warn!(code = %err.code(), error = %err, "chat request failed");
                }
                let body = ErrorResponse::new(err.code().to_string(), err.to_string())
                    .retryable(err.is_retryable());
                (status, Json(body)).into_response()
            }
            ChatApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(message)),
            )
                .into_response(),
        }
    }
}
