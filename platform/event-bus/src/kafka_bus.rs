//! Kafka-based implementation of the EventBus trait

use crate::{BusError, BusMessage, BusResult, EventBus};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;

/// Fixed consumer tuning for the completion-event topic.
///
/// These values come from the deployment's Kafka client defaults, not from
/// per-call configuration — one topic, one consumer group, one shape.
#[derive(Debug, Clone)]
pub struct KafkaBusConfig {
    pub bootstrap_servers: String,
    pub group_id: String,
    pub auto_commit_interval_ms: u32,
    pub fetch_min_bytes: u32,
    pub fetch_max_bytes: u32,
    pub fetch_wait_max_ms: u32,
}

impl KafkaBusConfig {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: "payment-checker-group".to_string(),
            auto_commit_interval_ms: 1_000,
            fetch_min_bytes: 1,
            fetch_max_bytes: 10 * 1024 * 1024,
            fetch_wait_max_ms: 3_000,
        }
    }
}

/// EventBus implementation backed by `rdkafka`.
///
/// Production implementation: one `FutureProducer` for publish, a fresh
/// `StreamConsumer` per `subscribe` call reading with auto-commit enabled.
#[derive(Clone)]
pub struct KafkaBus {
    config: KafkaBusConfig,
    producer: FutureProducer,
}

impl KafkaBus {
    /// Connect a producer against `config.bootstrap_servers`.
    ///
    /// Subscribers are created lazily in `subscribe`, since each topic needs
    /// its own `StreamConsumer` with the shared group id.
    pub fn connect(config: KafkaBusConfig) -> BusResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;

        Ok(Self { config, producer })
    }
}

#[async_trait]
impl EventBus for KafkaBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()> {
        let record = FutureRecord::to(topic).key(key).payload(&payload);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| BusError::PublishError(e.to_string()))?;

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusResult<BoxStream<'static, BusMessage>> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("group.id", &self.config.group_id)
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                self.config.auto_commit_interval_ms.to_string(),
            )
            .set("fetch.min.bytes", self.config.fetch_min_bytes.to_string())
            .set(
                "fetch.message.max.bytes",
                self.config.fetch_max_bytes.to_string(),
            )
            .set("fetch.wait.max.ms", self.config.fetch_wait_max_ms.to_string())
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| BusError::SubscribeError(e.to_string()))?;

        let topic = topic.to_string();
        let stream = async_stream::stream! {
            loop {
                match consumer.recv().await {
                    Ok(borrowed) => {
                        let key = borrowed
                            .key()
                            .map(|k| String::from_utf8_lossy(k).into_owned())
                            .unwrap_or_default();
                        let payload = borrowed.payload().unwrap_or_default().to_vec();
                        yield BusMessage::new(topic.clone(), key, payload);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "kafka read error, ending poll");
                        break;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_fixed_tuning() {
        let cfg = KafkaBusConfig::new("localhost:9092");
        assert_eq!(cfg.group_id, "payment-checker-group");
        assert_eq!(cfg.auto_commit_interval_ms, 1_000);
        assert_eq!(cfg.fetch_min_bytes, 1);
        assert_eq!(cfg.fetch_max_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.fetch_wait_max_ms, 3_000);
    }
}
