//! Side effects emitted by the billing state machines.
//!
//! State machines never perform I/O. They return a list of effects that the
//! downstream notifier applies against the entitlement API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A change to apply against the external entitlement API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Give the customer access to a plan until `valid_until`.
    GrantEntitlement {
        customer_id: String,
        plan_type: String,
        subscription_id: String,
        valid_until: DateTime<Utc>,
    },
    /// Remove access to a plan from `effective_at`.
    RevokeEntitlement {
        customer_id: String,
        plan_type: String,
        subscription_id: String,
        effective_at: DateTime<Utc>,
    },
    /// Add purchased credits for a one-off payment.
    TopUpCredits {
        customer_id: String,
        plan_type: String,
        payment_id: String,
        amount: i64,
        currency: String,
    },
    /// Tell the customer a payment failed. Best effort.
    NotifyPaymentFailed {
        customer_id: String,
        payment_id: String,
        subscription_id: Option<String>,
        reason: String,
    },
}

impl SideEffect {
    /// Action name sent to the entitlement API.
    pub fn action(&self) -> &'static str {
        match self {
            SideEffect::GrantEntitlement { .. } => "grant",
            SideEffect::RevokeEntitlement { .. } => "revoke",
            SideEffect::TopUpCredits { .. } => "top_up_credits",
            SideEffect::NotifyPaymentFailed { .. } => "payment_failed",
        }
    }

    /// Returns true if failing to apply this effect must not fail the event.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, SideEffect::NotifyPaymentFailed { .. })
    }

    /// Customer the effect applies to.
    pub fn customer_id(&self) -> &str {
        match self {
            SideEffect::GrantEntitlement { customer_id, .. }
            | SideEffect::RevokeEntitlement { customer_id, .. }
            | SideEffect::TopUpCredits { customer_id, .. }
            | SideEffect::NotifyPaymentFailed { customer_id, .. } => customer_id,
        }
    }

    /// Deterministic key derived from the entity and the effect.
    ///
    /// Two deliveries that compute the same effect produce the same key, so
    /// the entitlement API can drop the second one even if this service's
    /// own idempotency record was lost.
    pub fn idempotency_key(&self) -> String {
        match self {
            SideEffect::GrantEntitlement {
                subscription_id,
                valid_until,
                ..
            } => format!(
                "subscription:{}:grant:{}",
                subscription_id,
                valid_until.timestamp()
            ),
            SideEffect::RevokeEntitlement {
                subscription_id, ..
            } => format!("subscription:{}:revoke", subscription_id),
            SideEffect::TopUpCredits { payment_id, .. } => {
                format!("payment:{}:top_up_credits", payment_id)
            }
            SideEffect::NotifyPaymentFailed { payment_id, .. } => {
                format!("payment:{}:payment_failed", payment_id)
            }
        }
    }
}

/// How a cancellation revokes entitlements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationPolicy {
    /// Keep access until the paid period ends.
    #[default]
    AtPeriodEnd,
    /// Revoke as of the cancellation time.
    Immediate,
}

/// Inputs a transition needs besides the entity and the payload.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub revocation_policy: RevocationPolicy,
}

/// Result of applying one event to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    /// New entity state to persist, or `None` when nothing changes.
    pub state: Option<T>,
    /// Effects to apply downstream, in order.
    pub effects: Vec<SideEffect>,
    /// Human-readable outcome stored in the idempotency record.
    pub summary: String,
}

impl<T> Transition<T> {
    pub fn noop(summary: impl Into<String>) -> Self {
        Self {
            state: None,
            effects: Vec::new(),
            summary: summary.into(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.state.is_none() && self.effects.is_empty()
    }
}
