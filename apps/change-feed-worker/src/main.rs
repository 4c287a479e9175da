mod models;
mod relay;

use core_lib::adapters::RedisEventBus;
use core_lib::{CoreError, EventPublisher};
use dotenvy::dotenv;
use futures_util::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use relay::relay;

const ROUTING_KEY: &str = "change.#";
const CONSUMER_TAG: &str = "change_feed_worker";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

struct WorkerSettings {
    rabbitmq_url: String,
    exchange_name: String,
    queue_name: String,
    redis_url: String,
}

fn required(name: &str) -> Result<String, CoreError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CoreError::Configuration(format!("{} must be set", name)))
}

impl WorkerSettings {
    fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            rabbitmq_url: required("RABBITMQ_URL")?,
            exchange_name: env::var("RABBITMQ_EXCHANGE_NAME").unwrap_or_else(|_| "dashboard_changes".to_string()),
            queue_name: env::var("RABBITMQ_QUEUE").unwrap_or_else(|_| "change_feed_worker_queue".to_string()),
            redis_url: required("REDIS_URL")?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();

    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting change feed worker v{}...", env!("CARGO_PKG_VERSION"));

    let settings = WorkerSettings::from_env().inspect_err(|e| error!("Invalid configuration: {}", e))?;

    let publisher: Arc<dyn EventPublisher> = Arc::new(RedisEventBus::new(&settings.redis_url, None).await?);
    info!("Connected to Redis for realtime publishing.");

    let connection = Connection::connect(&settings.rabbitmq_url, ConnectionProperties::default()).await?;
    info!("Connected to RabbitMQ.");
    let channel = connection.create_channel().await?;
    let mut consumer = setup_consumer(&channel, &settings.exchange_name, &settings.queue_name).await?;

    info!("Change feed worker started. Listening for changes...");

    while let Some(delivery_result) = consumer.next().await {
        let delivery = match delivery_result {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("Error receiving delivery: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        match relay(&delivery.data, publisher.as_ref()).await {
            Ok(_) => {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!("Failed to ACK change: {}", e);
                }
            }
            Err(e) => {
                let requeue = e.should_requeue();
                if requeue {
                    warn!("Change not relayed, requeueing: {}", e);
                } else {
                    error!("Dropping change: {}", e);
                }
                if let Err(nack_err) = delivery
                    .nack(BasicNackOptions {
                        requeue,
                        ..Default::default()
                    })
                    .await
                {
                    error!("Failed to NACK change: {}", nack_err);
                }
                if requeue {
                    // give the bus a moment before the redelivery arrives
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    warn!("Change feed consumer stream ended.");
    Ok(())
}

async fn setup_consumer(channel: &Channel, exchange: &str, queue_name: &str) -> Result<Consumer, lapin::Error> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(
            queue_name,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    info!("Queue '{}' declared.", queue_name);

    channel
        .queue_bind(
            queue_name,
            exchange,
            ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
    info!(
        "Queue '{}' bound to exchange '{}' with key '{}'.",
        queue_name, exchange, ROUTING_KEY
    );

    channel
        .basic_consume(
            queue_name,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
}
