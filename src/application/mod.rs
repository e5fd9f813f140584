//! Application layer - Commands, Queries, and Handlers.
//!
//! Handlers orchestrate domain operations over ports. `ChatService` wires them
//! for the HTTP surface; `ChatView` is the client-side conversation window
//! that drives them through the `ChatGateway` port.

pub mod chat_service;
pub mod chat_view;
pub mod handlers;

pub use chat_service::{ChatPorts, ChatService};
pub use chat_view::{ChatClient, ChatView, PendingSend, SendOutcome, ViewUpdate};
pub use handlers::chat::{
    ListConversationsHandler, ListConversationsQuery, ListMessagesHandler, ListMessagesQuery,
    ResolveConversationCommand, ResolveConversationHandler, ResolvedConversation,
    SendMessageCommand, SendMessageHandler,
};
