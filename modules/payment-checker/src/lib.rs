pub mod config;
pub mod consumer;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod kv;
pub mod models;
pub mod poller;
pub mod publisher;
pub mod registry;
pub mod supervisor;
pub mod task_handle;

pub use config::Config;
pub use fetcher::UpstreamFetcher;
pub use kv::{InMemoryKv, KvStore, RedisKv};
pub use models::{PaymentRecord, PaymentStatus};
pub use supervisor::PaymentChecker;
