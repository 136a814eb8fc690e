use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};

use rabbitmq_txn::logging::init_logging;
use rabbitmq_txn::rabbitmq::Publisher;
use rabbitmq_txn::routing::topic_for_account;
use rabbitmq_txn::{Config, MessageKind, TransactionMessage};

const PUBLISH_PAUSE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    let config = Config::load();
    init_logging(config.as_ref().map_or("debug", |c| c.log_level.as_str()));

    let result = match config {
        Ok(config) => run(config).await,
        Err(e) => Err(anyhow::Error::new(e).context("load config")),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let producer = Publisher::connect(&config.connection_config())
        .await
        .context("Failed to create producer")?;

    info!("Using deposit topic pattern: {}", config.laos_deposit_topic);
    info!("Using withdraw topic pattern: {}", config.laos_withdrawal_topic);

    let targets = [
        (
            &config.deposit_exchange_name,
            &config.laos_deposit_topic,
            MessageKind::Deposit,
        ),
        (
            &config.withdraw_exchange_name,
            &config.laos_withdrawal_topic,
            MessageKind::Withdraw,
        ),
    ];

    let mut failures = 0usize;
    for account_id in &config.producer_account_ids {
        for (exchange, pattern, kind) in targets {
            let topic = topic_for_account(pattern, account_id);
            let message = TransactionMessage::sample(kind, account_id);

            match producer.publish(exchange, &topic, &message, kind).await {
                Ok(()) => info!(account_id = %account_id, "Successfully published {} message", kind),
                Err(e) => {
                    failures += 1;
                    error!(account_id = %account_id, "Failed to publish {} message: {}", kind, e);
                }
            }
        }

        tokio::time::sleep(PUBLISH_PAUSE).await;
    }

    producer.close().await.context("Failed to close producer")?;

    if failures == 0 {
        info!("All test messages published successfully");
    } else {
        info!(failures, "Finished publishing with failures");
    }
    Ok(())
}
