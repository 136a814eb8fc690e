use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::broker::{Broker, ExchangeOptions};
use super::connection::{ConnectionConfig, ConnectionManager};
use super::errors::{RabbitMQError, Result};
use crate::message::{pretty_body, MessageKind};

/// Publishes JSON messages to topic exchanges.
pub struct Publisher<B: Broker> {
    broker: Arc<B>,
}

impl Publisher<ConnectionManager> {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(ConnectionManager::open(config).await?)))
    }
}

impl<B: Broker> Publisher<B> {
    pub fn new(broker: Arc<B>) -> Self {
        Publisher { broker }
    }

    pub async fn declare_exchange(&self, exchange: &str, options: ExchangeOptions) -> Result<()> {
        self.broker.declare_exchange(exchange, options).await
    }

    /// Declare `exchange` (durable topic), then publish `message` under `routing_key`.
    pub async fn publish<T: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &T,
        kind: MessageKind,
    ) -> Result<()> {
        self.declare_exchange(exchange, ExchangeOptions::default())
            .await?;

        let body = serde_json::to_vec(message).map_err(RabbitMQError::Encoding)?;

        info!(
            exchange = %exchange,
            "Publishing {} message to topic '{}':\n{}",
            kind,
            routing_key,
            pretty_body(&body)
        );

        self.broker.publish(exchange, routing_key, &body).await
    }

    pub async fn close(&self) -> Result<()> {
        self.broker.close().await
    }
}
