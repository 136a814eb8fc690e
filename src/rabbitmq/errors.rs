// src/rabbitmq/errors.rs

use serde_json::Error as SerdeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RabbitMQError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("RabbitMQ connection error: {0}")]
    Connection(String),

    #[error("RabbitMQ channel error: {0}")]
    Channel(String),

    #[error("Certificate load error: {0}")]
    CertificateLoad(String),

    #[error("Exchange declare error: {0}")]
    ExchangeConflict(String),

    #[error("Queue declare error: {0}")]
    QueueDeclare(String),

    #[error("Queue bind error: {0}")]
    Bind(String),

    #[error("Consumer registration error: {0}")]
    ConsumeRegistration(String),

    #[error("RabbitMQ publish error: {0}")]
    Publish(String),

    #[error("Message serialization error: {0}")]
    Encoding(#[source] SerdeError),

    #[error("Message deserialization error: {0}")]
    Decoding(#[source] SerdeError),

    #[error("Handler error: {0}")]
    Handler(String),
}

// Custom Result type for RabbitMQ operations
pub type Result<T> = std::result::Result<T, RabbitMQError>;
