//! Storage settings for idempotency records and entity state.
//!
//! Optional: without this section the service runs on in-memory stores,
//! which lose every record on restart.

use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;

/// Largest pool the webhook workload is allowed to open.
pub const MAX_POOL_SIZE: u32 = 100;

/// PostgreSQL pool settings (`BILLING_WEBHOOKS__DATABASE__*`).
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://` or `postgresql://` connection string.
    pub url: String,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a webhook waits for a pooled connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply `migrations/` before serving.
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.url.split_once("://") {
            None if self.url.is_empty() => {
                return Err(ValidationError::MissingRequired("DATABASE_URL"))
            }
            Some(("postgres" | "postgresql", _)) => {}
            _ => return Err(ValidationError::InvalidDatabaseUrl),
        }

        if self.max_connections > MAX_POOL_SIZE {
            return Err(ValidationError::PoolSizeTooLarge);
        }
        if self.min_connections > self.max_connections {
            return Err(ValidationError::InvalidPoolSize);
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            run_migrations: default_run_migrations(),
        }
    }
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    // Well under the notifier deadline so a starved pool fails fast
    2
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_run_migrations() -> bool {
    true
}
