//! Per-payment poller (C4): the heart of the core. One long-lived task per
//! tracked payment, looping CHECKING -> WAITING until a terminal status
//! (or cancellation) is observed.

use crate::fetcher::{Exchange, UpstreamFetcher};
use crate::models::PaymentStatus;
use crate::publisher::CompletionPublisher;
use crate::registry::TaskRegistry;
use crate::task_handle::TaskHandle;
use audit::{redact_headers, AuditEntry, AuditSink};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Per-call deadline for the upstream fetch. Not part of the backoff
/// schedule — this bounds a single HTTP round trip.
const FETCH_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct PollerContext {
    pub fetcher: Arc<UpstreamFetcher>,
    pub audit_sink: Arc<dyn AuditSink>,
    pub registry: Arc<TaskRegistry>,
    pub publisher: Arc<CompletionPublisher>,
    pub pool: PgPool,
}

/// Drives one poller to completion. Returns once the payment reaches a
/// terminal status or the handle is cancelled.
pub async fn run_poller(id: Uuid, handle: Arc<TaskHandle>, ctx: PollerContext) {
    loop {
        let delay_in_force = handle.current_delay();

        let (status, exchange) = ctx.fetcher.fetch(id, FETCH_DEADLINE).await;
        log_attempt(ctx.audit_sink.as_ref(), id, &exchange, delay_in_force).await;

        let status = PaymentStatus::from_upstream(&status);
        if status.is_terminal() {
            update_record_status(&ctx.pool, id, status).await;
            ctx.publisher.publish_completed(id).await;
            ctx.registry.remove(id).await;
            handle.cancel();
            return;
        }

        ctx.registry.set_next_retry(id, delay_in_force).await;

        let cancel_token = handle.cancel_token();
        tokio::select! {
            _ = cancel_token.cancelled() => {
                ctx.registry.remove(id).await;
                return;
            }
            woken = handle.recv_wake() => {
                if woken.is_none() {
                    return;
                }
                handle.reset_delay();
            }
            _ = tokio::time::sleep(delay_in_force) => {
                handle.grow_delay();
            }
        }
    }
}

async fn log_attempt(sink: &dyn AuditSink, payment_id: Uuid, exchange: &Exchange, delay: Duration) {
    let entry = AuditEntry::new(
        payment_id,
        exchange.method.clone(),
        exchange.url.clone(),
        redact_headers(&exchange.request_headers),
        None,
        redact_headers(&exchange.response_headers),
        exchange.response_body.clone(),
        exchange.status_code,
        delay,
    );

    if let Err(e) = sink.log_attempt(&entry).await {
        tracing::warn!(payment_id = %payment_id, error = %e, "failed to write audit log entry");
    }
}

async fn update_record_status(pool: &PgPool, id: Uuid, status: PaymentStatus) {
    let result = sqlx::query(
        "UPDATE payment_records SET status = $1, updated_at = now() WHERE id = $2",
    )
    .bind(status)
    .bind(id)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(payment_id = %id, error = %e, "failed to persist terminal status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_deadline_is_bounded() {
        assert!(FETCH_DEADLINE < Duration::from_secs(60));
    }
}
