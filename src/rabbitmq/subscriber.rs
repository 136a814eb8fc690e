use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_lite::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::broker::{Broker, DeliveryStream, ExchangeOptions};
use super::connection::{ConnectionConfig, ConnectionManager};
use super::errors::{RabbitMQError, Result};
use crate::message::{pretty_body, MessageKind};
use crate::routing::account_id_from_key;

/// How long `close` waits for delivery tasks to drain before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Binds queues to topic exchanges and runs one delivery task per subscription.
///
/// Deliveries are auto-acknowledged: a handler error is logged and the
/// message is gone.
pub struct Subscriber<B: Broker> {
    broker: Arc<B>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Subscriber<ConnectionManager> {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(ConnectionManager::open(config).await?)))
    }
}

impl<B: Broker> Subscriber<B> {
    pub fn new(broker: Arc<B>) -> Self {
        Subscriber {
            broker,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Declare `exchange`, bind a fresh queue with `pattern` and start
    /// delivering bodies to `handler`.
    pub async fn subscribe<F>(
        &self,
        exchange: &str,
        pattern: &str,
        kind: MessageKind,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(&[u8]) -> Result<()> + Send + Sync + 'static,
    {
        self.broker
            .declare_exchange(exchange, ExchangeOptions::default())
            .await?;
        let queue = self.broker.declare_queue().await?;
        self.broker.bind_queue(&queue, exchange, pattern).await?;
        let deliveries = self.broker.consume(&queue).await?;

        info!(
            exchange = %exchange,
            queue = %queue,
            "{} consumer started with topic pattern: {}",
            kind,
            pattern
        );

        let span = info_span!("subscription", kind = %kind, exchange = %exchange, queue = %queue);
        let task = tokio::spawn(run_deliveries(deliveries, kind, handler).instrument(span));

        self.tasks
            .lock()
            .map_err(|_| RabbitMQError::Channel("Subscription registry poisoned".to_string()))?
            .push(task);
        Ok(())
    }

    /// Subscriptions whose delivery task is still running.
    pub fn active_subscriptions(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|task| !task.is_finished()).count())
            .unwrap_or_default()
    }

    /// Close the broker and wait for every delivery task to end.
    pub async fn close(&self) -> Result<()> {
        let result = self.broker.close().await;

        let tasks = self
            .tasks
            .lock()
            .map(|mut tasks| std::mem::take(&mut *tasks))
            .unwrap_or_default();

        for mut task in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Delivery task ended abnormally: {}", e),
                Err(_) => {
                    warn!("Delivery task did not stop in time; aborting it");
                    task.abort();
                }
            }
        }

        result
    }
}

async fn run_deliveries<F>(mut deliveries: DeliveryStream, kind: MessageKind, handler: F)
where
    F: Fn(&[u8]) -> Result<()>,
{
    while let Some(delivery) = deliveries.next().await {
        let topic = delivery.routing_key.as_str();
        let account_id = account_id_from_key(topic);

        info!(
            topic = %topic,
            account_id = %account_id,
            "[{}] Received message:\n{}",
            kind,
            pretty_body(&delivery.body)
        );

        match panic::catch_unwind(AssertUnwindSafe(|| handler(&delivery.body))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(topic = %topic, "Error processing {} message: {}", kind, e),
            Err(_) => error!(topic = %topic, "{} handler panicked; message dropped", kind),
        }
    }

    debug!("Delivery stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rabbitmq::memory::InMemoryBroker;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_close_without_subscriptions() {
        let subscriber = Subscriber::new(Arc::new(InMemoryBroker::new()));
        subscriber.close().await.unwrap();
        assert_eq!(subscriber.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_handler_receives_raw_body() {
        let broker = Arc::new(InMemoryBroker::new());
        let subscriber = Subscriber::new(broker.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        subscriber
            .subscribe("ex", "deposit.laos.*", MessageKind::Deposit, move |body| {
                tx.send(body.to_vec()).ok();
                Ok(())
            })
            .await
            .unwrap();

        broker.publish("ex", "deposit.laos.42", b"not even json").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"not even json");

        subscriber.close().await.unwrap();
        assert_eq!(subscriber.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_handler_panic_does_not_end_subscription() {
        let broker = Arc::new(InMemoryBroker::new());
        let subscriber = Subscriber::new(broker.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        subscriber
            .subscribe("ex", "deposit.laos.*", MessageKind::Deposit, move |body| {
                if body == b"boom" {
                    panic!("handler blew up");
                }
                tx.send(body.to_vec()).ok();
                Ok(())
            })
            .await
            .unwrap();

        broker.publish("ex", "deposit.laos.1", b"boom").await.unwrap();
        broker.publish("ex", "deposit.laos.2", b"after").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"after");
        assert_eq!(subscriber.active_subscriptions(), 1);

        subscriber.close().await.unwrap();
        assert_eq!(subscriber.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_setup_error_propagates() {
        let broker = Arc::new(InMemoryBroker::new());
        broker
            .declare_exchange(
                "ex",
                ExchangeOptions {
                    durable: false,
                    auto_delete: false,
                },
            )
            .await
            .unwrap();
        let subscriber = Subscriber::new(broker.clone());

        let err = subscriber
            .subscribe("ex", "#", MessageKind::Withdraw, |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, RabbitMQError::ExchangeConflict(_)));
        assert_eq!(broker.queue_count(), 0);
    }
}
