//! # EventBus Abstraction
//!
//! A platform-level abstraction for the single completion-event topic that
//! feeds the payment-checker boost loop.
//!
//! ## Why This Lives in Tier 1
//!
//! The EventBus is a **shared runtime capability**. Placing it in
//! `platform/` (Tier 1) allows the service crate to depend on it without
//! hard-wiring a Kafka client into every call site, and lets tests swap in
//! an in-memory double.
//!
//! ## Implementations
//!
//! - **KafkaBus**: production implementation on `rdkafka`
//! - **InMemoryBus**: test/dev implementation using in-memory channels
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_bus::{EventBus, InMemoryBus};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
//!
//! bus.publish("payment.completed", "payment-completed", b"11111111-1111-1111-1111-111111111111".to_vec()).await?;
//!
//! let mut stream = bus.subscribe("payment.completed").await?;
//! while let Some(msg) = futures::StreamExt::next(&mut stream).await {
//!     println!("Received: {} bytes on {}", msg.payload.len(), msg.topic);
//! }
//! # Ok(())
//! # }
//! ```

mod inmemory_bus;
mod kafka_bus;

pub mod consumer_backoff;

pub use inmemory_bus::InMemoryBus;
pub use kafka_bus::{KafkaBus, KafkaBusConfig};

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// A message received from the event bus
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// The topic this message was published to
    pub topic: String,
    /// The record key (topic-name-string convention)
    pub key: String,
    /// The message payload (raw bytes)
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: String, key: String, payload: Vec<u8>) -> Self {
        Self {
            topic,
            key,
            payload,
        }
    }
}

/// Errors that can occur when using the event bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to publish message: {0}")]
    PublishError(String),

    #[error("failed to subscribe to topic: {0}")]
    SubscribeError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("read deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error: {0}")]
    InternalError(String),
}

/// Result type for event bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Core event bus abstraction for the completion-event topic
///
/// This trait defines the interface both implementations satisfy. It is
/// deliberately narrower than a general pub/sub abstraction: one topic, one
/// key convention, no wildcard subjects — that is all this system needs.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a message to a topic with the given record key.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()>;

    /// Subscribe to a topic, returning a stream of messages.
    ///
    /// Implementations that read with a per-call deadline (e.g. Kafka)
    /// surface `BusError::DeadlineExceeded` as a sentinel by ending the
    /// current poll without yielding a message; callers should treat an
    /// empty stream poll, not a stream-ending error, as the benign case —
    /// see `consumer_backoff` for the policy that expects this.
    async fn subscribe(&self, topic: &str) -> BusResult<BoxStream<'static, BusMessage>>;
}

impl fmt::Debug for dyn EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus")
    }
}
