//! Entitlement API configuration
//!
//! The entitlement API is the application backend that grants credits and
//! access. Retry settings bound how long one webhook may wait on it.

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Entitlement API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementConfig {
    /// Backend base URL, e.g. `https://api.internal:8000`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Value of the `X-Internal-API-Key` header
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Endpoint path appended to `base_url`
    #[serde(default = "default_path")]
    pub path: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempts per side effect, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds; doubles per attempt
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Upper bound on a single retry delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Budget for applying all effects of one event, in milliseconds
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

impl EntitlementConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.as_deref().map(|u| !u.is_empty()).unwrap_or(false)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Full endpoint URL, if a base URL is configured
    pub fn endpoint(&self) -> Option<String> {
        self.base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|base| format!("{}{}", base.trim_end_matches('/'), self.path))
    }

    /// Validate entitlement configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.is_empty()) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidEntitlementUrl);
            }
        } else if production {
            return Err(ValidationError::MissingRequired("ENTITLEMENT_BASE_URL"));
        }
        if production && self.api_key.is_none() {
            return Err(ValidationError::MissingRequired("ENTITLEMENT_API_KEY"));
        }
        if !self.path.starts_with('/') {
            return Err(ValidationError::InvalidEntitlementPath);
        }
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(ValidationError::InvalidRetryPolicy("max_attempts must be 1..=10"));
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(ValidationError::InvalidRetryPolicy(
                "base_backoff_ms exceeds max_backoff_ms",
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.deadline_ms == 0 || self.deadline_ms > 10_000 {
            return Err(ValidationError::InvalidDeadline);
        }
        Ok(())
    }
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            path: default_path(),
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

fn default_path() -> String {
    "/api/internal/entitlements".to_string()
}

fn default_request_timeout_ms() -> u64 {
    1500
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    1000
}

fn default_deadline_ms() -> u64 {
    4000
}
