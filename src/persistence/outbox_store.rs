use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::application::gateways::{OutboxMessage, OutboxStore, StoreError};

/// How long a claimed message stays invisible to other dispatchers
const LEASE_SECONDS: i32 = 60;

/// First retry delay after a failed delivery; doubles per attempt
const BACKOFF_BASE_SECONDS: f64 = 5.0;

const BACKOFF_CAP_SECONDS: f64 = 3600.0;

/// `notification_outbox` table
///
/// A failed message is hidden for an exponential backoff before it can be
/// claimed again. Once it has failed `max_attempts` times it is dead-lettered:
/// it stays in the table with its last error but is never claimed.
#[derive(Clone)]
pub struct PgOutboxStore {
    db_pool: PgPool,
    max_attempts: i32,
}

impl PgOutboxStore {
    pub fn new(db_pool: PgPool, max_attempts: u32) -> Self {
        Self {
            db_pool,
            max_attempts: i32::try_from(max_attempts).unwrap_or(i32::MAX),
        }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn claim_pending(&self, limit: u32) -> Result<Vec<OutboxMessage>, StoreError> {
        // SKIP LOCKED lets several instances poll the same table without
        // handing the same row to two of them.
        let mut messages = sqlx::query_as::<_, OutboxMessage>(
            r#"
            UPDATE notification_outbox
            SET locked_until = now() + make_interval(secs => $2)
            WHERE outbox_id IN (
                SELECT outbox_id
                FROM notification_outbox
                WHERE delivered_at IS NULL
                  AND attempts < $3
                  AND (locked_until IS NULL OR locked_until < now())
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING outbox_id, application_id, payload, attempts, created_at
            "#,
        )
        .bind(i64::from(limit))
        .bind(LEASE_SECONDS)
        .bind(self.max_attempts)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to claim outbox messages");
            StoreError::Retrieval(e.to_string())
        })?;

        // RETURNING does not preserve the subquery order
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn mark_delivered(&self, outbox_id: Uuid, delivery_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET delivered_at = now(), delivery_id = $2, locked_until = NULL, last_error = NULL
            WHERE outbox_id = $1
            "#,
        )
        .bind(outbox_id)
        .bind(delivery_id)
        .execute(&self.db_pool)
        .await
        .map_err(|e| {
            tracing::error!(outbox_id = %outbox_id, error = %e, "Failed to mark outbox message delivered");
            StoreError::Persistence(e.to_string())
        })?;

        Ok(())
    }

    async fn mark_failed(&self, outbox_id: Uuid, reason: &str) -> Result<(), StoreError> {
        // SET expressions see the pre-update `attempts`, so the first retry
        // waits BACKOFF_BASE_SECONDS.
        let attempts: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1,
                last_error = $2,
                locked_until = now() + make_interval(
                    secs => LEAST($3 * power(2, LEAST(attempts, 30)), $4)
                )
            WHERE outbox_id = $1 AND delivered_at IS NULL
            RETURNING attempts
            "#,
        )
        .bind(outbox_id)
        .bind(reason)
        .bind(BACKOFF_BASE_SECONDS)
        .bind(BACKOFF_CAP_SECONDS)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| {
            tracing::error!(outbox_id = %outbox_id, error = %e, "Failed to record outbox failure");
            StoreError::Persistence(e.to_string())
        })?;

        if attempts.is_some_and(|n| n >= self.max_attempts) {
            tracing::error!(
                outbox_id = %outbox_id,
                attempts = self.max_attempts,
                reason,
                "Outbox message dead-lettered"
            );
        }

        Ok(())
    }
}
