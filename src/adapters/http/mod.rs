//! HTTP adapters - REST and WebSocket API.

pub mod chat;
pub mod middleware;

use axum::{middleware::from_fn_with_state, routing::get, Router};

pub use chat::{chat_routes, ChatAppState};
pub use middleware::{auth_middleware, AuthState, RequireAuth};

/// Assemble the API: `/health` plus authenticated chat routes under `/api`.
///
/// Cross-cutting layers (tracing, CORS, timeouts) are added by the binary.
pub fn api_router(chat_state: ChatAppState, auth_state: AuthState) -> Router {
    let chat = chat_routes()
        .with_state(chat_state)
        .layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", chat)
}
