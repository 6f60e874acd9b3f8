//! PostgreSQL implementation of PaymentRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::Payment;
use crate::domain::foundation::DomainError;
use crate::ports::PaymentRepository;

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    subscription_id: Option<String>,
    customer_id: String,
    amount: i64,
    currency: String,
    status: String,
    failure_reason: Option<String>,
    last_event_id: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e: DomainError| {
            DomainError::database(format!("Invalid status value: {}", e.message))
                .with_detail("payment_id", row.id.clone())
        })?;

        Ok(Payment {
            id: row.id,
            subscription_id: row.subscription_id,
            customer_id: row.customer_id,
            amount: row.amount,
            currency: row.currency,
            status,
            failure_reason: row.failure_reason,
            last_event_id: row.last_event_id,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, subscription_id, customer_id, amount, currency, status, failure_reason,
                   last_event_id, updated_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find payment: {}", e)))?;

        row.map(Payment::try_from).transpose()
    }

    async fn upsert(&self, payment: &Payment) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, subscription_id, customer_id, amount, currency, status, failure_reason,
                last_event_id, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                subscription_id = EXCLUDED.subscription_id,
                status = EXCLUDED.status,
                failure_reason = EXCLUDED.failure_reason,
                last_event_id = EXCLUDED.last_event_id,
                updated_at = EXCLUDED.updated_at
            WHERE payments.status <> 'succeeded'
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.subscription_id)
        .bind(&payment.customer_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.failure_reason)
        .bind(&payment.last_event_id)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save payment: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
