//! PostgreSQL implementation of IdempotencyStore.
//!
//! `begin` is one `INSERT ... ON CONFLICT DO UPDATE ... WHERE ... RETURNING`
//! statement. The row lock taken by the conflict path serializes concurrent
//! claims, so at most one of them sees a returned row.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{BeginResult, IdempotencyRecord, IdempotencyStore, ProcessingOutcome};

pub struct PostgresIdempotencyStore {
    pool: PgPool,
    lease: Duration,
}

impl PostgresIdempotencyStore {
    /// Creates a store whose `processing` claims expire after `lease`.
    pub fn new(pool: PgPool, lease: Duration) -> Self {
        Self { pool, lease }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_id: String,
    event_type: String,
    first_seen_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    attempts: i32,
    outcome: String,
    result_summary: Option<String>,
}

impl TryFrom<WebhookEventRow> for IdempotencyRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(IdempotencyRecord {
            outcome: row.outcome.parse().map_err(|e: DomainError| {
                DomainError::database(format!("Invalid outcome value: {}", e.message))
            })?,
            event_id: row.event_id,
            event_type: row.event_type,
            first_seen_at: row.first_seen_at,
            updated_at: row.updated_at,
            attempts: row.attempts,
            result_summary: row.result_summary,
        })
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    async fn begin(&self, event_id: &str, event_type: &str) -> Result<BeginResult, DomainError> {
        let claimed: Option<(i32,)> = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (event_id, event_type, first_seen_at, updated_at, attempts, outcome)
            VALUES ($1, $2, NOW(), NOW(), 1, 'processing')
            ON CONFLICT (event_id) DO UPDATE SET
                outcome = 'processing',
                attempts = webhook_events.attempts + 1,
                updated_at = NOW(),
                result_summary = NULL
            WHERE webhook_events.outcome = 'failed'
               OR (webhook_events.outcome = 'processing'
                   AND webhook_events.updated_at <= NOW() - make_interval(secs => $3))
            RETURNING attempts
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(self.lease.num_seconds() as f64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to claim webhook event: {}", e)))?;

        if claimed.is_some() {
            return Ok(BeginResult::Proceed);
        }

        // The claim was refused; report what holds it
        let outcome: Option<(String,)> =
            sqlx::query_as("SELECT outcome FROM webhook_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::database(format!("Failed to read webhook event: {}", e))
                })?;

        let outcome = match outcome {
            Some((outcome,)) => outcome.parse()?,
            None => ProcessingOutcome::Processing,
        };
        Ok(BeginResult::AlreadyProcessed(outcome))
    }

    async fn commit(
        &self,
        event_id: &str,
        outcome: ProcessingOutcome,
        summary: &str,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events SET
                outcome = $2,
                result_summary = $3,
                updated_at = NOW()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(outcome.as_str())
        .bind(summary)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to commit webhook event: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("No idempotency record for event {}", event_id),
            ));
        }

        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<IdempotencyRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, first_seen_at, updated_at, attempts, outcome, result_summary
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find webhook event: {}", e)))?;

        row.map(IdempotencyRecord::try_from).transpose()
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE first_seen_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to purge webhook events: {}", e)))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(outcome: &str) -> WebhookEventRow {
        let now = Utc::now();
        WebhookEventRow {
            event_id: "evt_1".to_string(),
            event_type: "payment.succeeded".to_string(),
            first_seen_at: now,
            updated_at: now,
            attempts: 2,
            outcome: outcome.to_string(),
            result_summary: Some("topped up cus_1".to_string()),
        }
    }

    #[test]
    fn row_converts_each_outcome() {
        let outcomes = [
            ("processing", ProcessingOutcome::Processing),
            ("processed", ProcessingOutcome::Processed),
            ("failed", ProcessingOutcome::Failed),
        ];

        for (s, expected) in outcomes {
            let record = IdempotencyRecord::try_from(row(s)).unwrap();
            assert_eq!(record.outcome, expected);
        }
    }

    #[test]
    fn row_keeps_attempts_and_summary() {
        let record = IdempotencyRecord::try_from(row("processed")).unwrap();

        assert_eq!(record.event_id, "evt_1");
        assert_eq!(record.attempts, 2);
        assert_eq!(record.result_summary.as_deref(), Some("topped up cus_1"));
    }

    #[test]
    fn unknown_outcome_is_database_error() {
        let err = IdempotencyRecord::try_from(row("exploded")).unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.contains("exploded"));
    }
}
