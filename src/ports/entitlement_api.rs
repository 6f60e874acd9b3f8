//! EntitlementApi port - The application backend that owns entitlements.
//!
//! The notifier turns each `SideEffect` into an `EntitlementUpdate` and
//! sends it through this port. Implementations only classify failures;
//! retry policy lives in the notifier.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::billing::SideEffect;

/// Source tag sent with every update.
pub const UPDATE_SOURCE: &str = "dodo_webhook";

/// Request body for the entitlement API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitlementUpdate {
    pub customer_id: String,
    pub plan_type: Option<String>,
    pub action: &'static str,
    pub effective_at: DateTime<Utc>,
    pub source: &'static str,
    pub event_id: String,
    /// Provider entity the update derives from (subscription or payment id).
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EntitlementUpdate {
    /// Builds the request for an effect produced by event `event_id`.
    pub fn from_effect(effect: &SideEffect, event_id: &str, now: DateTime<Utc>) -> Self {
        let base = |plan_type: Option<&str>, reference: &str, effective_at| Self {
            customer_id: effect.customer_id().to_string(),
            plan_type: plan_type.map(str::to_string),
            action: effect.action(),
            effective_at,
            source: UPDATE_SOURCE,
            event_id: event_id.to_string(),
            reference: reference.to_string(),
            valid_until: None,
            amount: None,
            currency: None,
            reason: None,
        };

        match effect {
            SideEffect::GrantEntitlement {
                plan_type,
                subscription_id,
                valid_until,
                ..
            } => Self {
                valid_until: Some(*valid_until),
                ..base(Some(plan_type.as_str()), subscription_id, now)
            },
            SideEffect::RevokeEntitlement {
                plan_type,
                subscription_id,
                effective_at,
                ..
            } => base(Some(plan_type.as_str()), subscription_id, *effective_at),
            SideEffect::TopUpCredits {
                plan_type,
                payment_id,
                amount,
                currency,
                ..
            } => Self {
                amount: Some(*amount),
                currency: Some(currency.clone()),
                ..base(Some(plan_type.as_str()), payment_id, now)
            },
            SideEffect::NotifyPaymentFailed {
                payment_id, reason, ..
            } => Self {
                reason: Some(reason.clone()),
                ..base(None, payment_id, now)
            },
        }
    }
}

/// Classified failure from the entitlement API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntitlementApiError {
    /// Network error, timeout, 429, or 5xx. Worth retrying.
    #[error("entitlement API unavailable: {0}")]
    Unavailable(String),

    /// Any other non-success status. Retrying will not help.
    #[error("entitlement API rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl EntitlementApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EntitlementApiError::Unavailable(_))
    }
}

/// Port for the application backend's internal entitlement endpoint.
#[async_trait]
pub trait EntitlementApi: Send + Sync {
    /// Sends one update. `idempotency_key` is forwarded so the backend can
    /// drop duplicates.
    async fn send(
        &self,
        update: &EntitlementUpdate,
        idempotency_key: &str,
    ) -> Result<(), EntitlementApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 9, 8, 0, 0).unwrap()
    }

    #[test]
    fn top_up_carries_amount_and_currency() {
        let effect = SideEffect::TopUpCredits {
            customer_id: "cus_1".to_string(),
            plan_type: "credits".to_string(),
            payment_id: "pay_1".to_string(),
            amount: 499,
            currency: "USD".to_string(),
        };

        let update = EntitlementUpdate::from_effect(&effect, "evt_1", now());

        assert_eq!(update.action, "top_up_credits");
        assert_eq!(update.reference, "pay_1");
        assert_eq!(update.amount, Some(499));
        assert_eq!(update.currency.as_deref(), Some("USD"));
        assert_eq!(update.source, UPDATE_SOURCE);
    }

    #[test]
    fn revoke_uses_effect_time() {
        let later = now() + chrono::Duration::days(20);
        let effect = SideEffect::RevokeEntitlement {
            customer_id: "cus_1".to_string(),
            plan_type: "unlimited".to_string(),
            subscription_id: "sub_1".to_string(),
            effective_at: later,
        };

        let update = EntitlementUpdate::from_effect(&effect, "evt_2", now());

        assert_eq!(update.effective_at, later);
        assert_eq!(update.action, "revoke");
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let effect = SideEffect::NotifyPaymentFailed {
            customer_id: "cus_1".to_string(),
            payment_id: "pay_1".to_string(),
            subscription_id: None,
            reason: "insufficient_funds".to_string(),
        };

        let json = serde_json::to_value(EntitlementUpdate::from_effect(&effect, "evt_3", now()))
            .unwrap();

        assert_eq!(json["reason"], "insufficient_funds");
        assert!(json.get("amount").is_none());
        assert!(json.get("valid_until").is_none());
        assert!(json["plan_type"].is_null());
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(EntitlementApiError::Unavailable("timeout".to_string()).is_retryable());
        assert!(!EntitlementApiError::Rejected {
            status: 422,
            message: "bad plan".to_string()
        }
        .is_retryable());
    }
}
