//! Payment lifecycle.
//!
//! A payment is recorded once per provider payment id. `succeeded` is
//! terminal; a `failed` payment may later succeed when the customer retries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, StateMachine};

use super::event_kind::PaymentPayload;
use super::side_effect::{SideEffect, Transition, TransitionContext};

const UNKNOWN_FAILURE_REASON: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::new(
                ErrorCode::InvalidFormat,
                format!("Invalid payment status: {}", other),
            )),
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (PaymentStatus::Failed, PaymentStatus::Succeeded))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            PaymentStatus::Failed => vec![PaymentStatus::Succeeded],
            PaymentStatus::Succeeded => vec![],
        }
    }
}

/// A recorded payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: String,
    pub subscription_id: Option<String>,
    pub customer_id: String,
    /// Minor currency units.
    pub amount: i64,
    /// Upper-cased ISO 4217 code.
    pub currency: String,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub last_event_id: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTrigger {
    Succeeded,
    Failed,
}

/// Applies a payment event to the current state.
///
/// `TopUpCredits` is emitted at most once per payment id: it only fires on
/// entering `succeeded`, which is terminal.
pub fn apply_payment_event(
    current: Option<&Payment>,
    trigger: PaymentTrigger,
    payload: &PaymentPayload,
    ctx: &TransitionContext,
) -> Transition<Payment> {
    let id = &payload.payment_id;
    let target = match trigger {
        PaymentTrigger::Succeeded => PaymentStatus::Succeeded,
        PaymentTrigger::Failed => PaymentStatus::Failed,
    };

    if let Some(existing) = current {
        if !existing.status.can_transition_to(&target) {
            return Transition::noop(format!(
                "payment {} already {}; ignored {}",
                id, existing.status, target
            ));
        }
    }

    let from = current
        .map(|p| p.status.to_string())
        .unwrap_or_else(|| "new".to_string());
    let summary = format!("payment {}: {} -> {}", id, from, target);

    match target {
        PaymentStatus::Succeeded => {
            let next = build(payload, ctx, target, None);
            Transition {
                effects: vec![SideEffect::TopUpCredits {
                    customer_id: next.customer_id.clone(),
                    plan_type: payload.plan_type(),
                    payment_id: next.id.clone(),
                    amount: next.amount,
                    currency: next.currency.clone(),
                }],
                state: Some(next),
                summary,
            }
        }
        PaymentStatus::Failed => {
            let reason = payload
                .failure_reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(UNKNOWN_FAILURE_REASON)
                .to_string();
            let next = build(payload, ctx, target, Some(reason.clone()));
            Transition {
                effects: vec![SideEffect::NotifyPaymentFailed {
                    customer_id: next.customer_id.clone(),
                    payment_id: next.id.clone(),
                    subscription_id: next.subscription_id.clone(),
                    reason,
                }],
                state: Some(next),
                summary,
            }
        }
    }
}

fn build(
    payload: &PaymentPayload,
    ctx: &TransitionContext,
    status: PaymentStatus,
    failure_reason: Option<String>,
) -> Payment {
    Payment {
        id: payload.payment_id.clone(),
        subscription_id: payload.subscription_id.clone(),
        customer_id: payload.customer.customer_id.clone(),
        amount: payload.total_amount,
        currency: payload.currency.clone(),
        status,
        failure_reason,
        last_event_id: ctx.event_id.clone(),
        updated_at: ctx.now,
    }
}
