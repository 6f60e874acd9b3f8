//! HTTP DTOs for webhook endpoints.

use serde::{Deserialize, Serialize};

use crate::application::WebhookOutcome;

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// `processed` or `already_processed`.
    pub status: String,
    pub event_id: String,
}

impl From<&WebhookOutcome> for WebhookResponse {
    fn from(outcome: &WebhookOutcome) -> Self {
        Self {
            status: outcome.status().to_string(),
            event_id: outcome.event_id().to_string(),
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
