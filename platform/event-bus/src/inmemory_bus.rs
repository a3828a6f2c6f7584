//! In-memory implementation of the EventBus trait for testing and development

use crate::{BusMessage, BusResult, EventBus};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;

/// EventBus implementation using in-memory channels
///
/// This implementation is suitable for:
/// - Unit tests (no external dependencies)
/// - Local development without a Kafka broker
/// - Integration tests that need fast, isolated message buses
///
/// Messages are broadcast to all subscribers via Tokio broadcast channels,
/// filtered to the topic a given subscriber asked for. There is only one
/// topic in this system, but the filter keeps tests that use distinct topic
/// names for isolation working as expected.
///
/// # Example
/// ```rust
/// use event_bus::{EventBus, InMemoryBus};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryBus::new();
///
/// let mut stream = bus.subscribe("payment.completed").await?;
/// bus.publish("payment.completed", "some-id", b"hello".to_vec()).await?;
///
/// let msg = stream.next().await.unwrap();
/// assert_eq!(msg.topic, "payment.completed");
/// assert_eq!(msg.payload, b"hello");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBus {
    sender: Arc<broadcast::Sender<BusMessage>>,
}

impl InMemoryBus {
    /// Create a new in-memory event bus.
    ///
    /// The bus uses a broadcast channel with a buffer of 1000 messages.
    /// If this buffer is exceeded, the oldest messages will be dropped.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create a new in-memory event bus with a custom buffer size.
    pub fn with_capacity(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self {
            sender: Arc::new(sender),
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()> {
        let msg = BusMessage::new(topic.to_string(), key.to_string(), payload);

        // Ignore the error if there are no receivers — that's fine.
        let _ = self.sender.send(msg);

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusResult<BoxStream<'static, BusMessage>> {
        let mut receiver = self.sender.subscribe();
        let topic = topic.to_string();

        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(msg) => {
                        if msg.topic == topic {
                            yield msg;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "InMemoryBus: subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_subscribe_roundtrip() {
        let bus = InMemoryBus::new();
        let mut stream = bus.subscribe("payment.completed").await.unwrap();

        let payload = b"test message".to_vec();
        bus.publish("payment.completed", "record-1", payload.clone())
            .await
            .unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(msg.topic, "payment.completed");
        assert_eq!(msg.key, "record-1");
        assert_eq!(msg.payload, payload);
    }

    #[tokio::test]
    async fn subscribers_only_see_their_own_topic() {
        let bus = InMemoryBus::new();
        let mut stream = bus.subscribe("payment.completed").await.unwrap();

        bus.publish("other.topic", "x", b"no match".to_vec())
            .await
            .unwrap();
        bus.publish("payment.completed", "x", b"match".to_vec())
            .await
            .unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        assert_eq!(msg.payload, b"match".to_vec());
    }

    #[tokio::test]
    async fn multiple_subscribers_both_receive() {
        let bus = InMemoryBus::new();
        let mut stream1 = bus.subscribe("payment.completed").await.unwrap();
        let mut stream2 = bus.subscribe("payment.completed").await.unwrap();

        let payload = b"broadcast".to_vec();
        bus.publish("payment.completed", "k", payload.clone())
            .await
            .unwrap();

        let msg1 = tokio::time::timeout(std::time::Duration::from_secs(1), stream1.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        let msg2 = tokio::time::timeout(std::time::Duration::from_secs(1), stream2.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(msg1.payload, payload);
        assert_eq!(msg2.payload, payload);
    }
}
