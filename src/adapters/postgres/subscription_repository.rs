//! PostgreSQL implementation of SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::Subscription;
use crate::domain::foundation::DomainError;
use crate::ports::SubscriptionRepository;

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    customer_id: String,
    plan_type: String,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    last_event_id: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e: DomainError| {
            DomainError::database(format!("Invalid status value: {}", e.message))
                .with_detail("subscription_id", row.id.clone())
        })?;

        Ok(Subscription {
            id: row.id,
            customer_id: row.customer_id,
            plan_type: row.plan_type,
            status,
            current_period_end: row.current_period_end,
            cancelled_at: row.cancelled_at,
            last_event_id: row.last_event_id,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, plan_type, status, current_period_end, cancelled_at,
                   last_event_id, updated_at
            FROM subscriptions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find subscription: {}", e)))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn upsert(&self, subscription: &Subscription) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, customer_id, plan_type, status, current_period_end, cancelled_at,
                last_event_id, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                plan_type = EXCLUDED.plan_type,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                cancelled_at = EXCLUDED.cancelled_at,
                last_event_id = EXCLUDED.last_event_id,
                updated_at = EXCLUDED.updated_at
            WHERE subscriptions.status <> 'cancelled'
            "#,
        )
        .bind(&subscription.id)
        .bind(&subscription.customer_id)
        .bind(&subscription.plan_type)
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end)
        .bind(subscription.cancelled_at)
        .bind(&subscription.last_event_id)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save subscription: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
