// src/rabbitmq/broker.rs
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::errors::Result;

/// One message as handed to a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
}

pub type DeliveryStream = BoxStream<'static, Delivery>;

/// Properties a topic exchange is declared with. Redeclaring with the same
/// options is a no-op; different options are a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeOptions {
    pub durable: bool,
    pub auto_delete: bool,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            durable: true,
            auto_delete: false,
        }
    }
}

/// The channel operations publishing and subscribing are built from.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Declare a topic exchange, failing with `ExchangeConflict` when it
    /// already exists with other options.
    async fn declare_exchange(&self, name: &str, options: ExchangeOptions) -> Result<()>;

    /// Declare a fresh server-named, durable, non-exclusive queue and return its name.
    async fn declare_queue(&self) -> Result<String>;

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<()>;

    /// Fire-and-forget publish of a JSON body.
    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<()>;

    /// Start an auto-acknowledged consumer. The stream ends when the broker is closed.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream>;

    /// Release every resource; calling it again is a no-op.
    async fn close(&self) -> Result<()>;
}
