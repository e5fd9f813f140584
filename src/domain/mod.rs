//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, events)
//! - `chat` - Conversations, messages and the optimistic timeline

pub mod chat;
pub mod foundation;
