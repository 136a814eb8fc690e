use anyhow::Context;
use tracing::{error, info};

use rabbitmq_txn::handler::handle_transaction_message;
use rabbitmq_txn::logging::{init_logging, shutdown_signal};
use rabbitmq_txn::rabbitmq::Subscriber;
use rabbitmq_txn::{Config, MessageKind};

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
    info!(environment = %config.environment, "Starting transaction consumer");

    let consumer = Subscriber::connect(&config.connection_config())
        .await
        .context("Failed to create consumer")?;

    let subscriptions = [
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

    for (exchange, pattern, kind) in subscriptions {
        if let Err(e) = consumer
            .subscribe(exchange, pattern, kind, handle_transaction_message)
            .await
        {
            consumer.close().await.ok();
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to set up {} consumer", kind.label().to_lowercase())));
        }
    }

    info!("RabbitMQ consumer started. Press CTRL+C to exit");
    shutdown_signal()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down RabbitMQ consumer...");
    consumer.close().await.context("Failed to close consumer")?;
    Ok(())
}
