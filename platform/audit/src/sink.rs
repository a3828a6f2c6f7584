//! Transactional Postgres sink for audit entries

use crate::{AuditEntry, AuditError};
use sqlx::PgPool;

/// Wraps a connection pool and writes one audit row per fetch attempt,
/// inside a transaction that either fully commits or rolls back.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert one row. Callers are expected to catch the error and log a
    /// warning rather than propagate it — audit failure must never stall a
    /// poller.
    pub async fn log_attempt(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut tx = self.pool.begin().await.map_err(AuditError::BeginFailed)?;

        sqlx::query(
            r#"
            INSERT INTO payment_record_check_logs (
                id, payment_id, occurred_at, method, url,
                request_headers, request_body, response_headers, response_body,
                status_code, delay_seconds
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.payment_id)
        .bind(entry.occurred_at)
        .bind(&entry.method)
        .bind(&entry.url)
        .bind(&entry.request_headers)
        .bind(&entry.request_body)
        .bind(&entry.response_headers)
        .bind(&entry.response_body)
        .bind(entry.status_code)
        .bind(entry.delay_seconds)
        .execute(&mut *tx)
        .await
        .map_err(AuditError::InsertFailed)?;

        tx.commit().await.map_err(AuditError::CommitFailed)?;

        Ok(())
    }
}
