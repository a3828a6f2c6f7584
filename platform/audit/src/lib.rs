//! Append-only audit trail for upstream fetch attempts
//!
//! One row is written per fetch attempt, inside a transaction that either
//! fully succeeds or is rolled back. Failure to write is caught by the
//! caller and turned into a warning — the audit log is never allowed to
//! interrupt a poller.

mod redact;
mod sink;

pub use redact::redact_headers;
pub use sink::PgAuditSink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Abstract collaborator for the relational log store, so pollers are
/// testable without a live Postgres — the same pattern `event_bus::EventBus`
/// and the payment-checker module's `KvStore` use.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_attempt(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn log_attempt(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        PgAuditSink::log_attempt(self, entry).await
    }
}

/// In-memory test double: records every entry it receives.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn log_attempt(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// One row of `payment_record_check_logs`: the full redacted exchange for a
/// single fetch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub request_headers: serde_json::Value,
    pub request_body: Option<Vec<u8>>,
    pub response_headers: serde_json::Value,
    pub response_body: Option<Vec<u8>>,
    pub status_code: i32,
    pub delay_seconds: i64,
}

impl AuditEntry {
    /// Build a new entry. `delay_seconds` is clamped to `max(0, floor(delay))`
    /// per the redaction/rounding rule applied at the sink boundary.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payment_id: Uuid,
        method: impl Into<String>,
        url: impl Into<String>,
        request_headers: serde_json::Value,
        request_body: Option<Vec<u8>>,
        response_headers: serde_json::Value,
        response_body: Option<Vec<u8>>,
        status_code: i32,
        delay: std::time::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            occurred_at: Utc::now(),
            method: method.into(),
            url: url.into(),
            request_headers,
            request_body,
            response_headers,
            response_body,
            status_code,
            delay_seconds: delay.as_secs() as i64,
        }
    }
}

/// Errors surfaced by the audit sink. Callers are expected to log and
/// continue — see `sink::PgAuditSink::log_attempt`.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to open transaction: {0}")]
    BeginFailed(#[source] sqlx::Error),

    #[error("failed to insert audit row: {0}")]
    InsertFailed(#[source] sqlx::Error),

    #[error("failed to commit transaction: {0}")]
    CommitFailed(#[source] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> AuditEntry {
        AuditEntry::new(
            Uuid::new_v4(),
            "GET",
            "https://upstream.example/api/v1/payments/1",
            serde_json::json!({}),
            None,
            serde_json::json!({}),
            None,
            200,
            std::time::Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn in_memory_sink_records_every_logged_attempt() {
        let sink = InMemoryAuditSink::new();
        let entry = sample_entry();
        let payment_id = entry.payment_id;

        sink.log_attempt(&entry).await.unwrap();
        sink.log_attempt(&sample_entry()).await.unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payment_id, payment_id);
    }
}
