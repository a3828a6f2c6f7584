//! Supervisor / façade (C8): registers, starts, lists, and restores
//! pollers. Owns the in-process task map exclusively; the boost fabric
//! only reads it.

use crate::fetcher::UpstreamFetcher;
use crate::kv::KvStore;
use crate::models::{PaymentRecord, PaymentStatus};
use crate::poller::{self, PollerContext};
use crate::publisher::CompletionPublisher;
use crate::registry::TaskRegistry;
use crate::task_handle::TaskHandle;
use audit::{AuditSink, PgAuditSink};
use dashmap::{DashMap, DashSet};
use event_bus::EventBus;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const DEDUP_TTL: Duration = Duration::from_secs(600);

pub struct PaymentChecker {
    pool: PgPool,
    kv: Arc<dyn KvStore>,
    registry: Arc<TaskRegistry>,
    fetcher: Arc<UpstreamFetcher>,
    audit_sink: Arc<dyn AuditSink>,
    publisher: Arc<CompletionPublisher>,
    tasks: DashMap<Uuid, Arc<TaskHandle>>,
    dedup: DashSet<Uuid>,
    root_cancel: CancellationToken,
}

impl PaymentChecker {
    pub fn new(
        pool: PgPool,
        bus: Arc<dyn EventBus>,
        kv: Arc<dyn KvStore>,
        fetcher: UpstreamFetcher,
        completion_topic: String,
    ) -> Self {
        let audit_sink: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(pool.clone()));
        Self::new_with_audit_sink(pool, bus, kv, fetcher, completion_topic, audit_sink)
    }

    pub fn new_with_audit_sink(
        pool: PgPool,
        bus: Arc<dyn EventBus>,
        kv: Arc<dyn KvStore>,
        fetcher: UpstreamFetcher,
        completion_topic: String,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            audit_sink,
            registry: Arc::new(TaskRegistry::new(kv.clone())),
            publisher: Arc::new(CompletionPublisher::new(bus, completion_topic)),
            fetcher: Arc::new(fetcher),
            pool,
            kv,
            tasks: DashMap::new(),
            dedup: DashSet::new(),
            root_cancel: CancellationToken::new(),
        }
    }

    /// Test-only constructor: builds a `PaymentChecker` without a real
    /// upstream or a live Postgres, for exercising the boost/dedup/registry
    /// machinery against in-memory collaborators.
    #[cfg(test)]
    pub fn new_for_test(
        pool: PgPool,
        bus: Arc<dyn EventBus>,
        kv: Arc<dyn KvStore>,
        completion_topic: String,
    ) -> Self {
        let fetcher = UpstreamFetcher::new(
            reqwest::Client::new(),
            "http://unused.invalid".to_string(),
            "unused".to_string(),
        );
        Self::new_with_audit_sink(
            pool,
            bus,
            kv,
            fetcher,
            completion_topic,
            Arc::new(audit::InMemoryAuditSink::new()),
        )
    }

    pub fn root_cancel_token(&self) -> CancellationToken {
        self.root_cancel.clone()
    }

    /// Idempotent: a second call for an id with a live poller is a no-op
    /// that logs a duplicate-start warning.
    pub async fn start_polling(self: &Arc<Self>, id: Uuid) {
        if self.tasks.contains_key(&id) {
            tracing::warn!(payment_id = %id, "duplicate start_polling call, ignored");
            return;
        }

        let handle = Arc::new(TaskHandle::child_of(&self.root_cancel));
        self.tasks.insert(id, handle.clone());
        self.registry.persist(id).await;

        let ctx = PollerContext {
            fetcher: self.fetcher.clone(),
            audit_sink: self.audit_sink.clone(),
            registry: self.registry.clone(),
            publisher: self.publisher.clone(),
            pool: self.pool.clone(),
        };

        let checker = self.clone();
        tokio::spawn(async move {
            poller::run_poller(id, handle, ctx).await;
            checker.tasks.remove(&id);
        });
    }

    /// Thin wrapper over the boost fabric, exposed for testing and for the
    /// streaming consumer.
    pub fn boost_other(&self, origin_id: Uuid) {
        for entry in self.tasks.iter() {
            if *entry.key() == origin_id {
                continue;
            }
            if entry.value().try_wake() {
                tracing::debug!(payment_id = %entry.key(), origin = %origin_id, "boosted peer poller");
            } else {
                tracing::debug!(payment_id = %entry.key(), origin = %origin_id, "peer already has a pending wake");
            }
        }
    }

    /// Atomic test-and-set against the in-process dedup set, optionally
    /// backed by a durable TTL key so dedup survives a restart. Returns
    /// `true` if this is the first time `id` has been seen.
    pub async fn mark_seen(&self, id: Uuid) -> bool {
        if !self.dedup.insert(id) {
            return false;
        }

        let key = format!("kafka:seen:{id}");
        match self.kv.set_if_not_exists(&key, "1", DEDUP_TTL).await {
            Ok(first_seen) => first_seen,
            Err(e) => {
                tracing::warn!(payment_id = %id, error = %e, "dedup durable check failed, using in-process result");
                true
            }
        }
    }

    #[cfg(test)]
    pub fn seen_count(&self) -> usize {
        self.dedup.len()
    }

    pub async fn create(&self, tag: String, description: String, amount: Decimal) -> Result<PaymentRecord, sqlx::Error> {
        sqlx::query_as::<_, PaymentRecord>(
            r#"
            INSERT INTO payment_records (id, tag, description, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING id, tag, description, amount, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tag)
        .bind(description)
        .bind(amount)
        .bind(PaymentStatus::Pending)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<PaymentRecord>, sqlx::Error> {
        sqlx::query_as::<_, PaymentRecord>(
            "SELECT id, tag, description, amount, status, created_at, updated_at FROM payment_records WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub fn list_running(&self) -> Vec<Uuid> {
        self.tasks.iter().map(|e| *e.key()).collect()
    }

    /// Tolerates partial failures: each restored id is started
    /// independently, so one failure does not abort the rest.
    pub async fn restore(self: &Arc<Self>) {
        for id in self.registry.restore().await {
            self.start_polling(id).await;
        }
    }
}
