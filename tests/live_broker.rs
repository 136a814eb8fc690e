// These tests need a running RabbitMQ and are ignored by default.
//
// Run with: RABBITMQ_TEST_HOST=localhost:5672/%2f cargo test --test live_broker -- --ignored

use std::sync::Arc;
use std::time::Duration;

use rabbitmq_txn::handler::decode_transaction;
use rabbitmq_txn::rabbitmq::{
    ConnectionConfig, ConnectionManager, ExchangeOptions, Publisher, RabbitMQError, Subscriber,
};
use rabbitmq_txn::routing::topic_for_account;
use rabbitmq_txn::{MessageKind, TransactionMessage};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        user: std::env::var("RABBITMQ_TEST_USER").unwrap_or_else(|_| "guest".into()),
        password: std::env::var("RABBITMQ_TEST_PASSWORD").unwrap_or_else(|_| "guest".into()),
        host: std::env::var("RABBITMQ_TEST_HOST").unwrap_or_else(|_| "localhost:5672/%2f".into()),
        ..ConnectionConfig::default()
    }
}

fn unique_exchange() -> String {
    format!("rust_rmq_test_{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore]
async fn test_round_trip_through_rabbitmq() {
    let config = test_config();
    let subscriber = Subscriber::connect(&config).await.unwrap();
    let publisher = Publisher::connect(&config).await.unwrap();
    let exchange = unique_exchange();
    let (tx, mut rx) = mpsc::unbounded_channel();

    subscriber
        .subscribe(&exchange, "deposit.laos.*", MessageKind::Deposit, move |body: &[u8]| {
            tx.send(body.to_vec()).ok();
            Ok(())
        })
        .await
        .unwrap();

    let message = TransactionMessage::sample_deposit("00120010010106019");
    let topic = topic_for_account("deposit.laos.*", "00120010010106019");
    publisher
        .publish(&exchange, &topic, &message, MessageKind::Deposit)
        .await
        .unwrap();

    let body = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no delivery from broker")
        .unwrap();
    assert_eq!(body, serde_json::to_vec(&message).unwrap());
    assert_eq!(decode_transaction(&body).unwrap(), message);

    publisher.close().await.unwrap();
    timeout(Duration::from_secs(10), subscriber.close())
        .await
        .expect("close must not hang")
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn test_conflicting_redeclare_is_rejected_by_broker() {
    let manager = Arc::new(ConnectionManager::open(&test_config()).await.unwrap());
    let publisher = Publisher::new(manager.clone());
    let exchange = unique_exchange();

    let transient = ExchangeOptions {
        durable: false,
        auto_delete: true,
    };
    publisher.declare_exchange(&exchange, transient).await.unwrap();
    publisher.declare_exchange(&exchange, transient).await.unwrap();

    let err = publisher
        .declare_exchange(&exchange, ExchangeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RabbitMQError::ExchangeConflict(_)));

    // The broker closed the channel after the conflict; closing must still succeed.
    publisher.close().await.unwrap();
    publisher.close().await.unwrap();
}
