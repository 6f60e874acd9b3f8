//! Webhook error types.
//!
//! Defines every failure that can end webhook processing, with the HTTP
//! status and wire error code each one maps to. The status decides whether
//! the provider redelivers: 2xx and 4xx are final, 5xx triggers redelivery.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// HMAC signature did not match the request body and timestamp.
    #[error("Invalid signature")]
    InvalidSignature,

    /// A required `webhook-*` header is absent or malformed.
    #[error("Missing or malformed header: {0}")]
    MissingHeaders(&'static str),

    /// Signed timestamp is further from the local clock than the tolerance.
    #[error("Timestamp outside tolerance ({skew_secs}s skew)")]
    ClockSkew { skew_secs: i64 },

    /// Body is not valid JSON, or the payload lacks required fields.
    #[error("Malformed body: {0}")]
    MalformedBody(String),

    /// Authentic event of a type this service does not handle.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Entitlement API stayed unavailable after local retries.
    #[error("Downstream unavailable: {0}")]
    DownstreamRetryable(String),

    /// Entitlement API rejected the request as malformed.
    #[error("Downstream rejected request: {0}")]
    DownstreamFatal(String),

    /// Idempotency store or entity table failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// No webhook secret is configured, so nothing can be verified.
    #[error("Webhook secret not configured")]
    NotConfigured,

    /// Processing task panicked or was aborted.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver this webhook.
    pub fn is_retryable(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::MissingHeaders(_)
            | WebhookError::ClockSkew { .. }
            | WebhookError::MalformedBody(_) => StatusCode::BAD_REQUEST,

            // Accepted so the provider stops redelivering
            WebhookError::UnknownEventType(_) => StatusCode::OK,

            WebhookError::DownstreamRetryable(_) | WebhookError::NotConfigured => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            WebhookError::DownstreamFatal(_)
            | WebhookError::Storage(_)
            | WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code carried in the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            // A stale signature is as unauthentic as a wrong one
            WebhookError::InvalidSignature | WebhookError::ClockSkew { .. } => {
                "INVALID_SIGNATURE"
            }
            WebhookError::MissingHeaders(_) => "MISSING_HEADERS",
            WebhookError::MalformedBody(_) => "MISSING_DATA",
            WebhookError::UnknownEventType(_) => "UNKNOWN_EVENT_TYPE",
            WebhookError::DownstreamRetryable(_) => "DOWNSTREAM_UNAVAILABLE",
            WebhookError::DownstreamFatal(_) => "DOWNSTREAM_REJECTED",
            WebhookError::NotConfigured => "WEBHOOK_NOT_CONFIGURED",
            WebhookError::Storage(_) | WebhookError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    // ══════════════════════════════════════════════════════════════
    // Display
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn missing_headers_displays_header_name() {
        let err = WebhookError::MissingHeaders("webhook-id");
        assert_eq!(format!("{}", err), "Missing or malformed header: webhook-id");
    }

    #[test]
    fn clock_skew_displays_skew() {
        let err = WebhookError::ClockSkew { skew_secs: 901 };
        assert_eq!(format!("{}", err), "Timestamp outside tolerance (901s skew)");
    }

    #[test]
    fn domain_error_converts_to_storage() {
        let err: WebhookError = DomainError::new(ErrorCode::DatabaseError, "pool timed out").into();
        assert!(matches!(err, WebhookError::Storage(ref m) if m.contains("pool timed out")));
    }

    // ══════════════════════════════════════════════════════════════
    // Status codes and wire codes
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn verification_failures_are_bad_request() {
        for err in [
            WebhookError::InvalidSignature,
            WebhookError::MissingHeaders("webhook-signature"),
            WebhookError::ClockSkew { skew_secs: -600 },
            WebhookError::MalformedBody("expected value".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{:?}", err);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn wire_codes_match_external_contract() {
        assert_eq!(WebhookError::InvalidSignature.error_code(), "INVALID_SIGNATURE");
        assert_eq!(
            WebhookError::ClockSkew { skew_secs: 400 }.error_code(),
            "INVALID_SIGNATURE"
        );
        assert_eq!(WebhookError::MissingHeaders("webhook-id").error_code(), "MISSING_HEADERS");
        assert_eq!(
            WebhookError::MalformedBody("no data".to_string()).error_code(),
            "MISSING_DATA"
        );
    }

    #[test]
    fn unknown_event_type_is_acknowledged() {
        let err = WebhookError::UnknownEventType("refund.succeeded".to_string());
        assert_eq!(err.status_code(), StatusCode::OK);
        assert!(!err.is_retryable());
    }

    #[test]
    fn exhausted_downstream_retries_ask_for_redelivery() {
        let err = WebhookError::DownstreamRetryable("503 after 3 attempts".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_retryable());
    }

    #[test]
    fn fatal_downstream_and_storage_are_internal_errors() {
        let fatal = WebhookError::DownstreamFatal("422".to_string());
        let storage = WebhookError::Storage("deadlock".to_string());

        assert_eq!(fatal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fatal.error_code(), "DOWNSTREAM_REJECTED");
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn not_configured_is_service_unavailable() {
        let err = WebhookError::NotConfigured;
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "WEBHOOK_NOT_CONFIGURED");
    }
}
