//! Completion publisher (C6): emits one message on the completion topic
//! when a payment reaches a terminal status.

use event_bus::EventBus;
use std::sync::Arc;
use uuid::Uuid;

pub struct CompletionPublisher {
    bus: Arc<dyn EventBus>,
    topic: String,
}

impl CompletionPublisher {
    pub fn new(bus: Arc<dyn EventBus>, topic: String) -> Self {
        Self { bus, topic }
    }

    /// Publish failure is logged but never re-enqueued — the upstream
    /// remains the source of truth and will be re-read on the next run if
    /// the registry still contains the id.
    pub async fn publish_completed(&self, id: Uuid) {
        let key = self.topic.clone();
        let value = id.to_string().into_bytes();

        if let Err(e) = self.bus.publish(&self.topic, &key, value).await {
            tracing::warn!(payment_id = %id, error = %e, "failed to publish completion event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::InMemoryBus;
    use futures::StreamExt;

    #[tokio::test]
    async fn publish_completed_sends_id_as_text() {
        let bus = Arc::new(InMemoryBus::new());
        let mut stream = bus.clone().subscribe("payment.completed").await.unwrap();
        let publisher = CompletionPublisher::new(bus, "payment.completed".to_string());

        let id = Uuid::new_v4();
        publisher.publish_completed(id).await;

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, id.to_string().into_bytes());
    }
}
