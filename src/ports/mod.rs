//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `ConversationRepository` - Constrained-unique conversation rows
//! - `MessageStore` - Append-only message log, the writer of record
//!
//! ## Collaborator Ports
//!
//! - `ProfileReader` - Batch display names from the identity service
//! - `ProductCatalog` - Product names and recorded sellers
//! - `SessionValidator` - Bearer token validation
//!
//! ## Event and Delivery Ports
//!
//! - `EventPublisher` / `EventSubscriber` / `EventHandler` - Domain events
//! - `RealtimeTransport` - Cross-process pub/sub channels per conversation
//! - `DeliveryBus` - Subscriber registry that chat views attach to
//!
//! ## Client Port
//!
//! - `ChatGateway` - Server operations a chat view drives

mod chat_gateway;
mod conversation_repository;
mod delivery_bus;
mod event_publisher;
mod event_subscriber;
mod message_store;
mod product_catalog;
mod profile_reader;
mod realtime_transport;
mod session_validator;

pub use chat_gateway::ChatGateway;
pub use conversation_repository::{ConversationRepository, InsertOutcome};
pub use delivery_bus::{DeliveryBus, DeliveryEvent, DeliveryListener, SubscriptionHandle};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventHandler, EventSubscriber};
pub use message_store::MessageStore;
pub use product_catalog::ProductCatalog;
pub use profile_reader::ProfileReader;
pub use realtime_transport::{
    channel_for, RealtimeTransport, TransportSignal, TransportStream, CHANNEL_PREFIX,
};
pub use session_validator::SessionValidator;
