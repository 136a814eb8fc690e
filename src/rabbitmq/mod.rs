// src/rabbitmq/mod.rs
// Broker access: connection setup, TLS, publishing and subscribing

pub mod broker;
pub mod connection;
pub mod errors;
pub mod memory;
pub mod publisher;
pub mod subscriber;
pub mod tls;

// Re-export specific items to simplify imports elsewhere
pub use broker::{Broker, Delivery, DeliveryStream, ExchangeOptions};
pub use connection::{ConnectionConfig, ConnectionManager};
pub use errors::{RabbitMQError, Result};
pub use memory::InMemoryBroker;
pub use publisher::Publisher;
pub use subscriber::Subscriber;
pub use tls::{build_tls_context, TlsContext, TlsOptions};
