//! Event classification.
//!
//! Maps a verified event's type tag and `data` to a closed set of typed
//! variants. Adding a type means adding a variant, and every `match` over
//! `EventKind` then fails to compile until it handles it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::webhook_errors::WebhookError;
use super::webhook_event::WebhookEvent;

pub const SUBSCRIPTION_CREATED: &str = "subscription.created";
pub const SUBSCRIPTION_ACTIVE: &str = "subscription.active";
pub const SUBSCRIPTION_RENEWED: &str = "subscription.renewed";
pub const SUBSCRIPTION_ON_HOLD: &str = "subscription.on_hold";
pub const SUBSCRIPTION_CANCELLED: &str = "subscription.cancelled";
pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";
pub const PAYMENT_FAILED: &str = "payment.failed";

const DEFAULT_SUBSCRIPTION_PLAN: &str = "unlimited";
const DEFAULT_PAYMENT_PLAN: &str = "credits";

/// Customer reference carried in payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomerRef {
    pub customer_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// `data` of a `subscription.*` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionPayload {
    pub subscription_id: String,
    pub customer: CustomerRef,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "next_billing_date")]
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl SubscriptionPayload {
    /// Plan granted by this subscription.
    ///
    /// Read from `metadata.plan_type`, then `product_id`.
    pub fn plan_type(&self) -> String {
        metadata_str(&self.metadata, "plan_type")
            .or(self.product_id.as_deref())
            .unwrap_or(DEFAULT_SUBSCRIPTION_PLAN)
            .to_string()
    }

    /// Whether the provider reports the subscription as active.
    pub fn reports_active(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("active"))
            .unwrap_or(false)
    }

    fn validate(self) -> Result<Self, String> {
        if self.subscription_id.trim().is_empty() {
            return Err("subscription_id is empty".to_string());
        }
        if self.customer.customer_id.trim().is_empty() {
            return Err("customer.customer_id is empty".to_string());
        }
        Ok(self)
    }
}

/// `data` of a `payment.*` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentPayload {
    pub payment_id: String,
    #[serde(default)]
    pub subscription_id: Option<String>,
    pub customer: CustomerRef,
    /// Minor currency units.
    #[serde(alias = "amount")]
    pub total_amount: i64,
    pub currency: String,
    #[serde(default, alias = "error_message")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl PaymentPayload {
    pub fn plan_type(&self) -> String {
        metadata_str(&self.metadata, "plan_type")
            .unwrap_or(DEFAULT_PAYMENT_PLAN)
            .to_string()
    }

    fn validate(mut self) -> Result<Self, String> {
        if self.payment_id.trim().is_empty() {
            return Err("payment_id is empty".to_string());
        }
        if self.customer.customer_id.trim().is_empty() {
            return Err("customer.customer_id is empty".to_string());
        }
        if self.total_amount < 0 {
            return Err(format!("amount must be non-negative, got {}", self.total_amount));
        }
        let currency = self.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("invalid currency code: {:?}", self.currency));
        }
        self.currency = currency.to_ascii_uppercase();
        Ok(self)
    }
}

fn metadata_str<'a>(metadata: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Every event type this service acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    SubscriptionCreated(SubscriptionPayload),
    SubscriptionActive(SubscriptionPayload),
    SubscriptionRenewed(SubscriptionPayload),
    SubscriptionOnHold(SubscriptionPayload),
    SubscriptionCancelled(SubscriptionPayload),
    PaymentSucceeded(PaymentPayload),
    PaymentFailed(PaymentPayload),
}

impl EventKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::SubscriptionCreated(_) => SUBSCRIPTION_CREATED,
            EventKind::SubscriptionActive(_) => SUBSCRIPTION_ACTIVE,
            EventKind::SubscriptionRenewed(_) => SUBSCRIPTION_RENEWED,
            EventKind::SubscriptionOnHold(_) => SUBSCRIPTION_ON_HOLD,
            EventKind::SubscriptionCancelled(_) => SUBSCRIPTION_CANCELLED,
            EventKind::PaymentSucceeded(_) => PAYMENT_SUCCEEDED,
            EventKind::PaymentFailed(_) => PAYMENT_FAILED,
        }
    }
}

/// Classification result.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Known(EventKind),
    /// Authentic event of a type this service ignores.
    Unknown(String),
}

/// Classifies an event and validates its payload.
///
/// # Errors
///
/// Returns `MalformedBody` if a known type's `data` lacks required fields
/// or carries invalid values.
pub fn classify(event: &WebhookEvent) -> Result<Classified, WebhookError> {
    let kind = match event.event_type.as_str() {
        SUBSCRIPTION_CREATED => EventKind::SubscriptionCreated(subscription(event)?),
        SUBSCRIPTION_ACTIVE => EventKind::SubscriptionActive(subscription(event)?),
        SUBSCRIPTION_RENEWED => EventKind::SubscriptionRenewed(subscription(event)?),
        SUBSCRIPTION_ON_HOLD => EventKind::SubscriptionOnHold(subscription(event)?),
        SUBSCRIPTION_CANCELLED => EventKind::SubscriptionCancelled(subscription(event)?),
        PAYMENT_SUCCEEDED => EventKind::PaymentSucceeded(payment(event)?),
        PAYMENT_FAILED => EventKind::PaymentFailed(payment(event)?),
        other => return Ok(Classified::Unknown(other.to_string())),
    };
    Ok(Classified::Known(kind))
}

fn subscription(event: &WebhookEvent) -> Result<SubscriptionPayload, WebhookError> {
    decode::<SubscriptionPayload>(event)?
        .validate()
        .map_err(|msg| malformed(event, msg))
}

fn payment(event: &WebhookEvent) -> Result<PaymentPayload, WebhookError> {
    decode::<PaymentPayload>(event)?
        .validate()
        .map_err(|msg| malformed(event, msg))
}

fn decode<T: DeserializeOwned>(event: &WebhookEvent) -> Result<T, WebhookError> {
    if !event.data.is_object() {
        return Err(malformed(event, "data must be an object".to_string()));
    }
    T::deserialize(&event.data).map_err(|e| malformed(event, e.to_string()))
}

fn malformed(event: &WebhookEvent, msg: String) -> WebhookError {
    WebhookError::MalformedBody(format!("{}: {}", event.event_type, msg))
}
