//! Durable task registry (C3): the set of payment ids whose pollers should
//! be live, plus per-id retry hints, backed by the key-value store.

use crate::kv::KvStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const POLLING_TASKS_KEY: &str = "polling_tasks";

pub struct TaskRegistry {
    kv: Arc<dyn KvStore>,
}

impl TaskRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn persist(&self, id: Uuid) {
        if let Err(e) = self.kv.sadd(POLLING_TASKS_KEY, &id.to_string()).await {
            tracing::warn!(payment_id = %id, error = %e, "failed to persist task registry entry");
        }
    }

    pub async fn remove(&self, id: Uuid) {
        if let Err(e) = self.kv.srem(POLLING_TASKS_KEY, &id.to_string()).await {
            tracing::warn!(payment_id = %id, error = %e, "failed to remove task registry entry");
        }
    }

    /// Returns the full set of registered ids. Malformed members are
    /// skipped with a warning; the restore never fails as a whole.
    pub async fn restore(&self) -> Vec<Uuid> {
        match self.kv.smembers(POLLING_TASKS_KEY).await {
            Ok(members) => members
                .into_iter()
                .filter_map(|raw| match Uuid::parse_str(&raw) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        tracing::warn!(raw = %raw, error = %e, "skipping malformed registry member");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to restore task registry");
                Vec::new()
            }
        }
    }

    pub async fn set_next_retry(&self, id: Uuid, delay: Duration) {
        let next = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            + delay;
        let key = format!("retry:{id}");
        if let Err(e) = self
            .kv
            .set_ex(&key, &next.as_secs().to_string(), delay)
            .await
        {
            tracing::warn!(payment_id = %id, error = %e, "failed to set next retry");
        }
    }

    pub async fn get_next_retry(&self, id: Uuid) -> Option<u64> {
        let key = format!("retry:{id}");
        match self.kv.get(&key).await {
            Ok(Some(raw)) => raw.parse::<u64>().ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(payment_id = %id, error = %e, "failed to get next retry");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKv;

    #[tokio::test]
    async fn persist_then_remove_returns_to_prior_state() {
        let registry = TaskRegistry::new(Arc::new(InMemoryKv::new()));
        let id = Uuid::new_v4();

        assert!(!registry.restore().await.contains(&id));
        registry.persist(id).await;
        assert!(registry.restore().await.contains(&id));
        registry.remove(id).await;
        assert!(!registry.restore().await.contains(&id));
    }

    #[tokio::test]
    async fn restore_skips_malformed_members_without_failing() {
        let kv = Arc::new(InMemoryKv::new());
        kv.sadd("polling_tasks", "not-a-uuid").await.unwrap();
        kv.sadd("polling_tasks", &Uuid::new_v4().to_string())
            .await
            .unwrap();

        let registry = TaskRegistry::new(kv);
        let restored = registry.restore().await;
        assert_eq!(restored.len(), 1);
    }

    #[tokio::test]
    async fn set_and_get_next_retry_roundtrips() {
        let registry = TaskRegistry::new(Arc::new(InMemoryKv::new()));
        let id = Uuid::new_v4();
        registry.set_next_retry(id, Duration::from_secs(10)).await;
        assert!(registry.get_next_retry(id).await.is_some());
    }
}
