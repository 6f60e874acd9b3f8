//! Webhook ingestion configuration

use chrono::Duration;
use secrecy::SecretString;
use serde::Deserialize;

use crate::domain::billing::{RevocationPolicy, DEFAULT_TOLERANCE_SECS};

use super::error::ValidationError;

/// Shortest retention accepted; the provider redelivers for up to three days.
pub const MIN_RETENTION_DAYS: i64 = 7;

/// Webhook configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared signing secret. Without it every webhook is refused with 503.
    #[serde(default)]
    pub secret: Option<SecretString>,

    /// Accepted distance between the signed timestamp and local time
    #[serde(default = "default_tolerance")]
    pub clock_skew_tolerance_secs: i64,

    /// Age after which an unfinished `processing` claim can be taken over
    #[serde(default = "default_processing_lease")]
    pub processing_lease_secs: i64,

    /// How long idempotency records are kept
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// How often the janitor purges expired records
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    /// When a cancellation revokes access
    #[serde(default)]
    pub revocation_policy: RevocationPolicy,
}

impl WebhookConfig {
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn processing_lease(&self) -> Duration {
        Duration::seconds(self.processing_lease_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::days(self.retention_days)
    }

    pub fn purge_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.purge_interval_secs)
    }

    /// Validate webhook configuration
    ///
    /// The secret is only required in production; elsewhere a missing secret
    /// is reported by the health endpoint instead.
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if production && self.secret.is_none() {
            return Err(ValidationError::MissingRequired("WEBHOOK_SECRET"));
        }
        if self.clock_skew_tolerance_secs <= 0 || self.clock_skew_tolerance_secs > 3600 {
            return Err(ValidationError::InvalidSkewTolerance);
        }
        if self.processing_lease_secs <= 0 {
            return Err(ValidationError::InvalidProcessingLease);
        }
        if self.retention_days < MIN_RETENTION_DAYS {
            return Err(ValidationError::RetentionTooShort(MIN_RETENTION_DAYS));
        }
        if self.purge_interval_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            clock_skew_tolerance_secs: default_tolerance(),
            processing_lease_secs: default_processing_lease(),
            retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval(),
            revocation_policy: RevocationPolicy::default(),
        }
    }
}

fn default_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}

fn default_processing_lease() -> i64 {
    60
}

fn default_retention_days() -> i64 {
    30
}

fn default_purge_interval() -> u64 {
    3600
}
