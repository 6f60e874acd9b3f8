//! Subscription lifecycle.
//!
//! ```text
//! pending ──> active <──> past_due
//!    │          │            │
//!    └──────────┴─> cancelled <┘
//! ```
//!
//! `cancelled` is terminal: a cancelled subscription is never resurrected,
//! whatever arrives for it afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, StateMachine};

use super::event_kind::SubscriptionPayload;
use super::side_effect::{RevocationPolicy, SideEffect, Transition, TransitionContext};
use super::webhook_errors::WebhookError;

/// Subscription status as tracked by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    PastDue,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(DomainError::new(
                ErrorCode::InvalidFormat,
                format!("Invalid subscription status: {}", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, PastDue)
                | (Active, Cancelled)
                | (PastDue, Active)
                | (PastDue, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, Cancelled],
            Active => vec![PastDue, Cancelled],
            PastDue => vec![Active, Cancelled],
            Cancelled => vec![],
        }
    }
}

/// A customer's subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub customer_id: String,
    pub plan_type: String,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub last_event_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Which lifecycle event is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionTrigger {
    Created,
    Active,
    Renewed,
    OnHold,
    Cancelled,
}

impl SubscriptionTrigger {
    fn target(&self, payload: &SubscriptionPayload) -> SubscriptionStatus {
        match self {
            SubscriptionTrigger::Created if payload.reports_active() => SubscriptionStatus::Active,
            SubscriptionTrigger::Created => SubscriptionStatus::Pending,
            SubscriptionTrigger::Active | SubscriptionTrigger::Renewed => {
                SubscriptionStatus::Active
            }
            SubscriptionTrigger::OnHold => SubscriptionStatus::PastDue,
            SubscriptionTrigger::Cancelled => SubscriptionStatus::Cancelled,
        }
    }
}

/// Applies a subscription event to the current state.
///
/// Pure: returns the state to persist and the effects to apply, and leaves
/// both to the caller.
///
/// # Errors
///
/// Returns `MalformedBody` when the event would activate the subscription
/// but carries no period end.
pub fn apply_subscription_event(
    current: Option<&Subscription>,
    trigger: SubscriptionTrigger,
    payload: &SubscriptionPayload,
    ctx: &TransitionContext,
) -> Result<Transition<Subscription>, WebhookError> {
    let id = &payload.subscription_id;
    let target = trigger.target(payload);

    if let Some(existing) = current {
        if existing.status.is_terminal() {
            return Ok(Transition::noop(format!(
                "subscription {} already {}; ignored",
                id, existing.status
            )));
        }

        if existing.status == target {
            return extend_if_later(existing, payload, ctx);
        }

        if existing.status.transition_to(target).is_err() {
            return Ok(Transition::noop(format!(
                "subscription {}: {} -> {} not allowed; ignored",
                id, existing.status, target
            )));
        }
    }

    let from = current
        .map(|s| s.status.to_string())
        .unwrap_or_else(|| "new".to_string());
    let summary = format!("subscription {}: {} -> {}", id, from, target);

    match target {
        SubscriptionStatus::Active => {
            let period_end = require_period_end(payload)?;
            let next = build(current, payload, ctx, target, Some(period_end), None);
            Ok(Transition {
                effects: vec![grant(&next, period_end)],
                state: Some(next),
                summary,
            })
        }
        SubscriptionStatus::Pending | SubscriptionStatus::PastDue => {
            let period_end = payload
                .current_period_end
                .or_else(|| current.and_then(|s| s.current_period_end));
            Ok(Transition {
                state: Some(build(current, payload, ctx, target, period_end, None)),
                effects: Vec::new(),
                summary,
            })
        }
        SubscriptionStatus::Cancelled => {
            let cancelled_at = payload.cancelled_at.unwrap_or(ctx.occurred_at);
            // The paid period survives cancellation
            let period_end = current
                .and_then(|s| s.current_period_end)
                .or(payload.current_period_end);
            let next = build(current, payload, ctx, target, period_end, Some(cancelled_at));
            let effective_at = revocation_time(ctx, cancelled_at, period_end);
            Ok(Transition {
                effects: vec![SideEffect::RevokeEntitlement {
                    customer_id: next.customer_id.clone(),
                    plan_type: next.plan_type.clone(),
                    subscription_id: next.id.clone(),
                    effective_at,
                }],
                state: Some(next),
                summary,
            })
        }
    }
}

/// Same-status delivery: only an active subscription with a later period
/// end changes anything.
fn extend_if_later(
    existing: &Subscription,
    payload: &SubscriptionPayload,
    ctx: &TransitionContext,
) -> Result<Transition<Subscription>, WebhookError> {
    let id = &existing.id;
    let later = match (payload.current_period_end, existing.current_period_end) {
        (Some(new_end), Some(old_end)) => new_end > old_end,
        (Some(_), None) => true,
        (None, _) => false,
    };

    if existing.status != SubscriptionStatus::Active || !later {
        return Ok(Transition::noop(format!(
            "subscription {} already {}; no change",
            id, existing.status
        )));
    }

    let period_end = require_period_end(payload)?;
    let next = build(
        Some(existing),
        payload,
        ctx,
        SubscriptionStatus::Active,
        Some(period_end),
        None,
    );
    Ok(Transition {
        effects: vec![grant(&next, period_end)],
        state: Some(next),
        summary: format!(
            "subscription {}: active period extended to {}",
            id,
            period_end.to_rfc3339()
        ),
    })
}

fn build(
    current: Option<&Subscription>,
    payload: &SubscriptionPayload,
    ctx: &TransitionContext,
    status: SubscriptionStatus,
    current_period_end: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
) -> Subscription {
    Subscription {
        id: payload.subscription_id.clone(),
        customer_id: current
            .map(|s| s.customer_id.clone())
            .unwrap_or_else(|| payload.customer.customer_id.clone()),
        plan_type: payload.plan_type(),
        status,
        current_period_end,
        cancelled_at,
        last_event_id: ctx.event_id.clone(),
        updated_at: ctx.now,
    }
}

fn grant(subscription: &Subscription, valid_until: DateTime<Utc>) -> SideEffect {
    SideEffect::GrantEntitlement {
        customer_id: subscription.customer_id.clone(),
        plan_type: subscription.plan_type.clone(),
        subscription_id: subscription.id.clone(),
        valid_until,
    }
}

fn require_period_end(payload: &SubscriptionPayload) -> Result<DateTime<Utc>, WebhookError> {
    payload.current_period_end.ok_or_else(|| {
        WebhookError::MalformedBody(format!(
            "subscription {} activation lacks current_period_end",
            payload.subscription_id
        ))
    })
}

fn revocation_time(
    ctx: &TransitionContext,
    cancelled_at: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match (ctx.revocation_policy, period_end) {
        (RevocationPolicy::Immediate, _) | (RevocationPolicy::AtPeriodEnd, None) => cancelled_at,
        (RevocationPolicy::AtPeriodEnd, Some(end)) if end > ctx.now => end,
        (RevocationPolicy::AtPeriodEnd, Some(_)) => ctx.now,
    }
}
