//! HTTP adapter for buyer/seller chat.
//!
//! - `POST /api/conversations/resolve` - Find or create the chat about a product
//! - `GET /api/conversations?role=` - Inbox for the caller as buyer or seller
//! - `GET /api/conversations/:id/messages` - Ordered history
//! - `POST /api/conversations/:id/messages` - Send a message
//! - `GET /api/conversations/:id/live` - WebSocket live delivery

pub mod dto;
pub mod handlers;
pub mod live;
pub mod routes;

pub use handlers::{status_for, ChatApiError, ChatAppState};
pub use routes::chat_routes;
