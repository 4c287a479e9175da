use crate::{BusMessage, BusStream, CoreError, EventPublisher, EventSubscriber};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tracing::{debug, info};

/// Redis implementation of EventPublisher and EventSubscriber using Pub/Sub.
///
/// Topic patterns ending in `*` are subscribed with PSUBSCRIBE, everything
/// else with SUBSCRIBE. Each `subscribe` call opens its own pub/sub
/// connection, closed when the returned stream is dropped.
#[derive(Clone)]
pub struct RedisEventBus {
    client: Client,
    publish_connection: MultiplexedConnection,
    channel_prefix: String,
}

impl RedisEventBus {
    pub async fn new(redis_url: &str, channel_prefix: Option<&str>) -> Result<Self, CoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| CoreError::Configuration(format!("Invalid Redis URL: {}", e)))?;
        let publish_connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(CoreError::infra)?;
        info!("Redis event bus publisher connected.");
        Ok(Self {
            client,
            publish_connection,
            channel_prefix: channel_prefix.unwrap_or("").to_string(),
        })
    }

    fn get_channel_name(&self, topic: &str) -> String {
        format!("{}{}", self.channel_prefix, topic)
    }
}

#[async_trait]
impl EventPublisher for RedisEventBus {
    async fn publish(&self, topic: &str, _event_type: &str, event_payload: &[u8]) -> Result<(), CoreError> {
        let mut conn = self.publish_connection.clone();
        let channel = self.get_channel_name(topic);
        let receivers: usize = conn
            .publish(&channel, event_payload)
            .await
            .map_err(CoreError::infra)?;
        debug!(%channel, receivers, "Published to Redis");
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for RedisEventBus {
    async fn subscribe(&self, topics: &[String]) -> Result<BusStream, CoreError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(CoreError::infra)?;
        for topic in topics {
            let channel = self.get_channel_name(topic);
            if channel.ends_with('*') {
                pubsub.psubscribe(&channel).await.map_err(CoreError::infra)?;
            } else {
                pubsub.subscribe(&channel).await.map_err(CoreError::infra)?;
            }
        }

        let prefix = self.channel_prefix.clone();
        let stream = pubsub.into_on_message().map(move |msg| {
            let channel = msg.get_channel_name();
            BusMessage {
                topic: channel.strip_prefix(prefix.as_str()).unwrap_or(channel).to_string(),
                payload: msg.get_payload_bytes().to_vec(),
            }
        });
        Ok(stream.boxed())
    }
}
