//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `BILLING_WEBHOOKS` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use billing_webhooks::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod entitlement;
mod error;
mod server;
mod webhook;

pub use database::DatabaseConfig;
pub use entitlement::EntitlementConfig;
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, ServerConfig};
pub use webhook::{WebhookConfig, MIN_RETENTION_DAYS};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration; in-memory storage when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Webhook verification and idempotency settings
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Entitlement API client settings
    #[serde(default)]
    pub entitlement: EntitlementConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `BILLING_WEBHOOKS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `BILLING_WEBHOOKS__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `BILLING_WEBHOOKS__WEBHOOK__SECRET=...` -> `webhook.secret = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("BILLING_WEBHOOKS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let production = self.is_production();
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        } else if production {
            return Err(ValidationError::MissingRequired("DATABASE_URL"));
        }
        self.webhook.validate(production)?;
        self.entitlement.validate(production)?;
        if self.entitlement.deadline() >= self.server.request_timeout() {
            return Err(ValidationError::DeadlineExceedsRequestTimeout);
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "BILLING_WEBHOOKS__DATABASE__URL",
        "BILLING_WEBHOOKS__WEBHOOK__SECRET",
        "BILLING_WEBHOOKS__WEBHOOK__REVOCATION_POLICY",
        "BILLING_WEBHOOKS__ENTITLEMENT__BASE_URL",
        "BILLING_WEBHOOKS__ENTITLEMENT__API_KEY",
        "BILLING_WEBHOOKS__ENTITLEMENT__MAX_ATTEMPTS",
        "BILLING_WEBHOOKS__SERVER__PORT",
        "BILLING_WEBHOOKS__SERVER__ENVIRONMENT",
    ];

    fn set_production_env() {
        env::set_var("BILLING_WEBHOOKS__DATABASE__URL", "postgresql://billing@localhost/billing");
        env::set_var("BILLING_WEBHOOKS__WEBHOOK__SECRET", "whsec_xxx");
        env::set_var("BILLING_WEBHOOKS__ENTITLEMENT__BASE_URL", "https://backend.internal");
        env::set_var("BILLING_WEBHOOKS__ENTITLEMENT__API_KEY", "internal_xxx");
        env::set_var("BILLING_WEBHOOKS__SERVER__ENVIRONMENT", "production");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_with_no_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        let config = result.unwrap();
        assert!(config.database.is_none());
        assert!(!config.webhook.is_configured());
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_production_env();
        env::set_var("BILLING_WEBHOOKS__WEBHOOK__REVOCATION_POLICY", "immediate");
        env::set_var("BILLING_WEBHOOKS__ENTITLEMENT__MAX_ATTEMPTS", "5");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.database.as_ref().map(|d| d.url.as_str()),
            Some("postgresql://billing@localhost/billing")
        );
        assert_eq!(
            config.webhook.revocation_policy,
            crate::domain::billing::RevocationPolicy::Immediate
        );
        assert_eq!(config.entitlement.max_attempts, 5);
        assert!(config.is_production());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_database() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_production_env();
        env::remove_var("BILLING_WEBHOOKS__DATABASE__URL");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("DATABASE_URL"))
        );
    }

    #[test]
    fn test_deadline_must_fit_inside_request_timeout() {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 1;
        config.entitlement.deadline_ms = 4000;

        assert_eq!(
            config.validate(),
            Err(ValidationError::DeadlineExceedsRequestTimeout)
        );

        config.entitlement.deadline_ms = 999;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("BILLING_WEBHOOKS__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
