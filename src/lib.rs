//! Publish and consume JSON transaction messages over RabbitMQ topic exchanges.

pub mod env;
pub mod handler;
pub mod logging;
pub mod message;
pub mod rabbitmq;
pub mod routing;

pub use env::{Config, Environment};
pub use message::{MessageKind, TransactionMessage, TxnAccount, TxnMethod, TxnStatus};
pub use rabbitmq::{RabbitMQError, Result};
