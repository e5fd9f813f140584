//! Axum router configuration for chat endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    list_conversations, list_messages, resolve_conversation, send_message, ChatAppState,
};
use super::live::live_conversation;

/// Create the chat API router, mounted at `/api`.
///
/// Every route expects `auth_middleware` to run first.
pub fn chat_routes() -> Router<ChatAppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/resolve", post(resolve_conversation))
        .route(
            "/conversations/:id/messages",
            get(list_messages).post(send_message),
        )
        .route("/conversations/:id/live", get(live_conversation))
}
