//! Adapters - Implementations of port interfaces.
//!
//! - `auth` - JWT session validation (plus a mock for tests)
//! - `events` - In-process domain event bus
//! - `http` - axum REST and WebSocket API
//! - `memory` - In-memory storage and directory adapters
//! - `postgres` - sqlx-backed conversation and message storage
//! - `realtime` - Delivery transports and the subscription manager

pub mod auth;
pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod realtime;

pub use events::InMemoryEventBus;
