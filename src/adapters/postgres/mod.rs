//! PostgreSQL adapters - Database implementations for the persistence ports.
//!
//! - `PostgresIdempotencyStore` - Webhook deduplication (`webhook_events`)
//! - `PostgresSubscriptionRepository` - `subscriptions` table
//! - `PostgresPaymentRepository` - `payments` table

mod idempotency_store;
mod payment_repository;
mod subscription_repository;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::domain::foundation::DomainError;

pub use idempotency_store::PostgresIdempotencyStore;
pub use payment_repository::PostgresPaymentRepository;
pub use subscription_repository::PostgresSubscriptionRepository;

/// Opens a connection pool sized from configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DomainError> {
    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to PostgreSQL"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::database(format!("Failed to connect: {}", e)))
}

/// Applies the embedded migrations in `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database(format!("Migration failed: {}", e)))?;
    tracing::info!("Database migrations completed");
    Ok(())
}
