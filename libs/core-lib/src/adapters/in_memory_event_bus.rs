use crate::{topic_matches, BusMessage, BusStream, CoreError, EventPublisher, EventSubscriber};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

/// In-memory implementation of the EventPublisher and EventSubscriber ports using a Tokio broadcast channel.
/// Suitable for testing and single-executable mode.
///
/// Every subscriber sees the single firehose and keeps the topics it asked
/// for. A subscriber that lags behind the channel capacity loses messages;
/// the query cache's staleness window bounds the damage.
#[derive(Debug, Clone)]
pub struct InMemoryEventBus {
    sender: Sender<BusMessage>,
}

impl InMemoryEventBus {
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self { sender }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, topic: &str, _event_type: &str, event_payload: &[u8]) -> Result<(), CoreError> {
        let message = BusMessage {
            topic: topic.to_string(),
            payload: event_payload.to_vec(),
        };
        // Err only means nobody is listening right now.
        let _ = self.sender.send(message);
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryEventBus {
    async fn subscribe(&self, topics: &[String]) -> Result<BusStream, CoreError> {
        let topics = topics.to_vec();
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            let keep = match item {
                Ok(msg) if topics.iter().any(|p| topic_matches(p, &msg.topic)) => Some(msg),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "In-memory bus subscriber lagged; messages lost");
                    None
                }
            };
            futures_util::future::ready(keep)
        });
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn topics(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = InMemoryEventBus::default();
        let payload = b"hello world".to_vec();

        let mut first = bus.subscribe(&topics(&["tenant:acme:deals"])).await.unwrap();
        let mut second = bus.subscribe(&topics(&["tenant:acme:*"])).await.unwrap();

        bus.publish("tenant:acme:deals", "update", &payload).await.unwrap();

        let msg = timeout(Duration::from_millis(100), first.next()).await.unwrap().unwrap();
        assert_eq!(msg.topic, "tenant:acme:deals");
        assert_eq!(msg.payload, payload);

        let msg = timeout(Duration::from_millis(100), second.next()).await.unwrap().unwrap();
        assert_eq!(msg.payload, payload);
    }

    #[tokio::test]
    async fn test_publish_with_no_subscribers() {
        let bus = InMemoryEventBus::default();
        assert!(bus.publish("tenant:acme:deals", "update", b"echo?").await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_after_publish_misses_earlier_messages() {
        let bus = InMemoryEventBus::default();
        bus.publish("tenant:acme:deals", "update", b"too late").await.unwrap();

        let mut stream = bus.subscribe(&topics(&["tenant:acme:*"])).await.unwrap();
        assert!(timeout(Duration::from_millis(50), stream.next()).await.is_err());

        bus.publish("tenant:acme:deals", "update", b"second").await.unwrap();
        let msg = timeout(Duration::from_millis(100), stream.next()).await.unwrap().unwrap();
        assert_eq!(msg.payload, b"second".to_vec());
    }

    #[tokio::test]
    async fn test_topics_are_filtered() {
        let bus = InMemoryEventBus::default();
        let mut acme = bus.subscribe(&topics(&["tenant:acme:*"])).await.unwrap();

        bus.publish("tenant:globex:deals", "update", b"not for acme").await.unwrap();
        bus.publish("tenant:acme:messages", "insert", b"for acme").await.unwrap();

        let msg = timeout(Duration::from_millis(100), acme.next()).await.unwrap().unwrap();
        assert_eq!(msg.topic, "tenant:acme:messages");
        assert!(timeout(Duration::from_millis(50), acme.next()).await.is_err());
    }
}
