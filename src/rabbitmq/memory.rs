// src/rabbitmq/memory.rs
//! A topic-exchange broker living entirely in process memory.
//!
//! Mirrors the behavior the publisher and subscriber rely on from RabbitMQ:
//! exchange redeclare rules, server-named queues, wildcard bindings and
//! auto-ack delivery. Closing drops every queue, which ends every consumer
//! stream.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::broker::{Broker, Delivery, DeliveryStream, ExchangeOptions};
use super::errors::{RabbitMQError, Result};
use crate::routing::topic_matches;

#[derive(Default)]
struct State {
    closed: bool,
    exchanges: HashMap<String, ExchangeOptions>,
    queues: HashMap<String, QueueSlot>,
    bindings: Vec<Binding>,
    published: Vec<(String, Delivery)>,
}

struct QueueSlot {
    sender: mpsc::UnboundedSender<Delivery>,
    // Taken by the first consumer.
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
}

struct Binding {
    exchange: String,
    pattern: String,
    queue: String,
}

#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<State>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish accepted so far, as `(exchange, delivery)`.
    pub fn published(&self) -> Vec<(String, Delivery)> {
        self.with_state(|state| Ok(state.published.clone()))
            .unwrap_or_default()
    }

    pub fn queue_count(&self) -> usize {
        self.with_state(|state| Ok(state.queues.len()))
            .unwrap_or_default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RabbitMQError::Channel("Broker state lock poisoned".to_string()))?;
        f(&mut state)
    }

    fn open_state<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        self.with_state(|state| {
            if state.closed {
                return Err(RabbitMQError::Channel("Channel is closed".to_string()));
            }
            f(state)
        })
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_exchange(&self, name: &str, options: ExchangeOptions) -> Result<()> {
        self.open_state(|state| match state.exchanges.get(name) {
            Some(existing) if *existing != options => Err(RabbitMQError::ExchangeConflict(format!(
                "PRECONDITION_FAILED - inequivalent arg for exchange '{}': declared {:?}, requested {:?}",
                name, existing, options
            ))),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_string(), options);
                Ok(())
            }
        })
    }

    async fn declare_queue(&self) -> Result<String> {
        self.open_state(|state| {
            let name = format!("amq.gen-{}", Uuid::new_v4().simple());
            let (sender, receiver) = mpsc::unbounded_channel();
            state.queues.insert(
                name.clone(),
                QueueSlot {
                    sender,
                    receiver: Some(receiver),
                },
            );
            Ok(name)
        })
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<()> {
        self.open_state(|state| {
            if !state.exchanges.contains_key(exchange) {
                return Err(RabbitMQError::Bind(format!(
                    "NOT_FOUND - no exchange '{}'",
                    exchange
                )));
            }
            if !state.queues.contains_key(queue) {
                return Err(RabbitMQError::Bind(format!("NOT_FOUND - no queue '{}'", queue)));
            }
            state.bindings.push(Binding {
                exchange: exchange.to_string(),
                pattern: pattern.to_string(),
                queue: queue.to_string(),
            });
            Ok(())
        })
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<()> {
        self.open_state(|state| {
            if !state.exchanges.contains_key(exchange) {
                return Err(RabbitMQError::Publish(format!(
                    "NOT_FOUND - no exchange '{}'",
                    exchange
                )));
            }

            let delivery = Delivery {
                routing_key: routing_key.to_string(),
                body: body.to_vec(),
            };

            // A queue bound twice with matching patterns still gets one copy.
            let mut targets: Vec<&str> = state
                .bindings
                .iter()
                .filter(|b| b.exchange == exchange && topic_matches(&b.pattern, routing_key))
                .map(|b| b.queue.as_str())
                .collect();
            targets.sort_unstable();
            targets.dedup();

            for queue in targets {
                if let Some(slot) = state.queues.get(queue) {
                    // A dropped receiver means the consumer went away; auto-ack loses the message.
                    let _ = slot.sender.send(delivery.clone());
                }
            }

            state.published.push((exchange.to_string(), delivery));
            Ok(())
        })
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        let mut receiver = self.open_state(|state| {
            let slot = state.queues.get_mut(queue).ok_or_else(|| {
                RabbitMQError::ConsumeRegistration(format!("NOT_FOUND - no queue '{}'", queue))
            })?;
            slot.receiver.take().ok_or_else(|| {
                RabbitMQError::ConsumeRegistration(format!(
                    "Queue '{}' already has a consumer",
                    queue
                ))
            })
        })?;

        let stream = futures::stream::poll_fn(move |cx| receiver.poll_recv(cx));
        Ok(stream.boxed())
    }

    async fn close(&self) -> Result<()> {
        self.with_state(|state| {
            state.closed = true;
            state.queues.clear();
            state.bindings.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_redeclare_rules() {
        let broker = InMemoryBroker::new();
        let options = ExchangeOptions::default();
        broker.declare_exchange("ex", options).await.unwrap();
        broker.declare_exchange("ex", options).await.unwrap();

        let transient = ExchangeOptions {
            durable: false,
            ..options
        };
        assert!(matches!(
            broker.declare_exchange("ex", transient).await,
            Err(RabbitMQError::ExchangeConflict(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_routes_to_matching_queue_only() {
        let broker = InMemoryBroker::new();
        broker
            .declare_exchange("ex", ExchangeOptions::default())
            .await
            .unwrap();
        let hit = broker.declare_queue().await.unwrap();
        let miss = broker.declare_queue().await.unwrap();
        broker.bind_queue(&hit, "ex", "a.*.c").await.unwrap();
        broker.bind_queue(&miss, "ex", "x.#").await.unwrap();

        let mut hits = broker.consume(&hit).await.unwrap();
        let mut misses = broker.consume(&miss).await.unwrap();
        broker.publish("ex", "a.b.c", b"{}").await.unwrap();
        broker.close().await.unwrap();

        assert_eq!(hits.next().await.unwrap().routing_key, "a.b.c");
        assert!(hits.next().await.is_none());
        assert!(misses.next().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_to_unknown_exchange_fails() {
        let broker = InMemoryBroker::new();
        assert!(matches!(
            broker.publish("nope", "a", b"{}").await,
            Err(RabbitMQError::Publish(_))
        ));
    }

    #[tokio::test]
    async fn test_second_consumer_on_queue_is_refused() {
        let broker = InMemoryBroker::new();
        let queue = broker.declare_queue().await.unwrap();
        let _first = broker.consume(&queue).await.unwrap();
        assert!(matches!(
            broker.consume(&queue).await,
            Err(RabbitMQError::ConsumeRegistration(_))
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_setup() {
        let broker = InMemoryBroker::new();
        broker.close().await.unwrap();
        broker.close().await.unwrap();
        assert!(broker.declare_queue().await.is_err());
    }
}
