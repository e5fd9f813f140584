//! In-memory adapters for tests and single-node development.

mod conversation_repository;
mod directory;
mod message_store;

pub use conversation_repository::InMemoryConversationRepository;
pub use directory::{InMemoryProductCatalog, InMemoryProfileDirectory};
pub use message_store::InMemoryMessageStore;
