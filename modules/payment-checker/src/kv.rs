//! Key-value store abstraction backing the durable task registry and dedup
//! marker.
//!
//! Grounded the same way `event_bus::EventBus` is: a trait plus a real
//! implementation and an in-memory test double, so the registry and
//! streaming consumer are testable without a live Redis.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("operation failed: {0}")]
    Operation(String),
}

pub type KvResult<T> = Result<T, KvError>;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn sadd(&self, set_key: &str, member: &str) -> KvResult<()>;
    async fn srem(&self, set_key: &str, member: &str) -> KvResult<()>;
    async fn smembers(&self, set_key: &str) -> KvResult<Vec<String>>;

    /// `SET key value EX ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// `SET key value NX EX ttl`. Returns `true` if the key was newly set.
    async fn set_if_not_exists(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool>;
}

/// Production implementation over a `redis::aio::ConnectionManager`.
#[derive(Clone)]
pub struct RedisKv {
    conn: redis::aio::ConnectionManager,
}

impl RedisKv {
    pub async fn connect(redis_url: &str) -> KvResult<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| KvError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| KvError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn sadd(&self, set_key: &str, member: &str) -> KvResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SADD")
            .arg(set_key)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| KvError::Operation(e.to_string()))
    }

    async fn srem(&self, set_key: &str, member: &str) -> KvResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SREM")
            .arg(set_key)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| KvError::Operation(e.to_string()))
    }

    async fn smembers(&self, set_key: &str) -> KvResult<Vec<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("SMEMBERS")
            .arg(set_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Operation(e.to_string()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| KvError::Operation(e.to_string()))
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Operation(e.to_string()))
    }

    async fn set_if_not_exists(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Operation(e.to_string()))?;
        Ok(result.is_some())
    }
}

/// In-memory test double. Sets are a `HashMap<String, HashSet<String>>`;
/// TTL'd keys are a `HashMap<String, (String, Instant)>` checked lazily on
/// read.
#[derive(Default)]
pub struct InMemoryKv {
    sets: Mutex<HashMap<String, std::collections::HashSet<String>>>,
    values: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn expire_if_needed(values: &mut HashMap<String, (String, Instant)>, key: &str) {
        if let Some((_, expires_at)) = values.get(key) {
            if Instant::now() >= *expires_at {
                values.remove(key);
            }
        }
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn sadd(&self, set_key: &str, member: &str) -> KvResult<()> {
        self.sets
            .lock()
            .unwrap()
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, set_key: &str, member: &str) -> KvResult<()> {
        if let Some(set) = self.sets.lock().unwrap().get_mut(set_key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, set_key: &str) -> KvResult<Vec<String>> {
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get(set_key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut values = self.values.lock().unwrap();
        Self::expire_if_needed(&mut values, key);
        Ok(values.get(key).map(|(v, _)| v.clone()))
    }

    async fn set_if_not_exists(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut values = self.values.lock().unwrap();
        Self::expire_if_needed(&mut values, key);
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sadd_srem_roundtrip_returns_to_prior_state() {
        let kv = InMemoryKv::new();
        kv.sadd("polling_tasks", "a").await.unwrap();
        assert_eq!(kv.smembers("polling_tasks").await.unwrap(), vec!["a"]);

        kv.srem("polling_tasks", "a").await.unwrap();
        assert!(kv.smembers("polling_tasks").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_if_not_exists_is_atomic_test_and_set() {
        let kv = InMemoryKv::new();
        assert!(kv
            .set_if_not_exists("kafka:seen:1", "1", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!kv
            .set_if_not_exists("kafka:seen:1", "1", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let kv = InMemoryKv::new();
        kv.set_ex("retry:a", "123", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(kv.get("retry:a").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(kv.get("retry:a").await.unwrap().is_none());
    }
}
