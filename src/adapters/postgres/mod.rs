//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! - `PostgresConversationRepository` - Constrained-unique conversation rows
//! - `PostgresMessageStore` - Append-only message log
//! - `PostgresProfileReader` / `PostgresProductCatalog` - Read-only marketplace lookups
//!
//! Schema lives in `migrations/` and is applied at startup.

mod conversation_repository;
mod directory;
mod message_store;

pub use conversation_repository::PostgresConversationRepository;
pub use directory::{PostgresProductCatalog, PostgresProfileReader};
pub use message_store::PostgresMessageStore;
