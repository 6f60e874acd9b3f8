//! Verified webhook event envelope.

use axum::body::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::webhook_errors::WebhookError;
use super::webhook_verifier::{WebhookHeaders, WEBHOOK_TIMESTAMP_HEADER};

/// An authenticated event as received from the billing provider.
///
/// Immutable once built; `raw_body` keeps the exact bytes that were signed.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Provider-assigned id from the `webhook-id` header.
    pub id: String,
    /// Dotted event type tag, e.g. `payment.succeeded`.
    pub event_type: String,
    /// When the provider created the event.
    pub created_at: DateTime<Utc>,
    /// Untouched request body.
    pub raw_body: Bytes,
    /// Variant payload, interpreted by the classifier.
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    data: Value,
}

impl WebhookEvent {
    /// Builds an event from verified headers and the signed body.
    ///
    /// The body must be a JSON object with a non-empty `type`. `data` is
    /// optional here; known event types validate it during classification.
    /// `created_at` prefers the body's `timestamp` over the signed header.
    pub fn parse(headers: &WebhookHeaders, raw_body: Bytes) -> Result<Self, WebhookError> {
        let envelope: Envelope = serde_json::from_slice(&raw_body)
            .map_err(|e| WebhookError::MalformedBody(e.to_string()))?;

        let event_type = envelope.event_type.trim().to_string();
        if event_type.is_empty() {
            return Err(WebhookError::MalformedBody("event type is empty".to_string()));
        }

        let created_at = match envelope.timestamp {
            Some(ts) => ts,
            None => Utc
                .timestamp_opt(headers.timestamp, 0)
                .single()
                .ok_or_else(|| WebhookError::MissingHeaders(WEBHOOK_TIMESTAMP_HEADER))?,
        };

        Ok(Self {
            id: headers.webhook_id.clone(),
            event_type,
            created_at,
            raw_body,
            data: envelope.data,
        })
    }
}
