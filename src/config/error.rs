//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Clock skew tolerance must be between 1 and 3600 seconds")]
    InvalidSkewTolerance,

    #[error("Processing lease must be positive")]
    InvalidProcessingLease,

    #[error("Retention must be at least {0} days")]
    RetentionTooShort(i64),

    #[error("Entitlement API URL must use http or https")]
    InvalidEntitlementUrl,

    #[error("Entitlement path must start with '/'")]
    InvalidEntitlementPath,

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(&'static str),

    #[error("Notifier deadline must be between 1 and 10000 ms")]
    InvalidDeadline,

    #[error("Notifier deadline must be shorter than the server request timeout")]
    DeadlineExceedsRequestTimeout,
}
