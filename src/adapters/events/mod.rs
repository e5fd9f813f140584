//! Event bus adapters.
//!
//! - `InMemoryEventBus` - In-process bus; handlers run on the publishing task

mod in_memory;

pub use in_memory::InMemoryEventBus;
