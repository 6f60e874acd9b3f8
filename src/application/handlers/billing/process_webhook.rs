//! ProcessWebhookHandler - Command handler for billing provider webhooks.
//!
//! ```text
//! Received -> Verified -> Deduplicated -> Routed -> Applied -> Acknowledged
//!                │              │
//!                └─ Rejected    └─ Acknowledged (replay)
//! ```
//!
//! Entity state is written only after every required side effect succeeds.
//! A failed event leaves state untouched, so the provider's redelivery
//! computes the same effects again.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::HeaderMap;
use chrono::Utc;

use crate::application::notifier::{CancelSignal, DownstreamNotifier};
use crate::domain::billing::{
    apply_payment_event, apply_subscription_event, classify, Classified, EventKind,
    PaymentTrigger, RevocationPolicy, SideEffect, SignatureVerifier, SubscriptionTrigger,
    Transition, TransitionContext, WebhookError, WebhookEvent,
};
use crate::ports::{
    BeginResult, IdempotencyStore, PaymentRepository, ProcessingOutcome, SubscriptionRepository,
};

/// Command to process one webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    pub headers: HeaderMap,
    /// Raw request body, exactly as signed.
    pub body: Bytes,
}

/// Successful outcome of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event applied.
    Processed { event_id: String },
    /// Event id was already handled, or is being handled elsewhere.
    AlreadyProcessed { event_id: String },
    /// Authentic event of a type this service does not act on.
    Ignored { event_id: String, event_type: String },
}

impl WebhookOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            WebhookOutcome::Processed { event_id }
            | WebhookOutcome::AlreadyProcessed { event_id }
            | WebhookOutcome::Ignored { event_id, .. } => event_id,
        }
    }

    /// Status reported to the provider.
    pub fn status(&self) -> &'static str {
        match self {
            WebhookOutcome::AlreadyProcessed { .. } => "already_processed",
            WebhookOutcome::Processed { .. } | WebhookOutcome::Ignored { .. } => "processed",
        }
    }
}

/// Pending entity write, applied after the side effects succeed.
enum StateWrite {
    Subscription(Transition<crate::domain::billing::Subscription>),
    Payment(Transition<crate::domain::billing::Payment>),
}

impl StateWrite {
    fn effects(&self) -> &[SideEffect] {
        match self {
            StateWrite::Subscription(t) => &t.effects,
            StateWrite::Payment(t) => &t.effects,
        }
    }

    fn summary(&self) -> &str {
        match self {
            StateWrite::Subscription(t) => &t.summary,
            StateWrite::Payment(t) => &t.summary,
        }
    }
}

/// Handler for billing provider webhooks.
pub struct ProcessWebhookHandler {
    /// `None` when no webhook secret is configured.
    verifier: Option<SignatureVerifier>,
    idempotency: Arc<dyn IdempotencyStore>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
    notifier: DownstreamNotifier,
    revocation_policy: RevocationPolicy,
}

impl ProcessWebhookHandler {
    pub fn new(
        verifier: Option<SignatureVerifier>,
        idempotency: Arc<dyn IdempotencyStore>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        payments: Arc<dyn PaymentRepository>,
        notifier: DownstreamNotifier,
        revocation_policy: RevocationPolicy,
    ) -> Self {
        Self {
            verifier,
            idempotency,
            subscriptions,
            payments,
            notifier,
            revocation_policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessWebhookCommand,
        cancel: CancelSignal,
    ) -> Result<WebhookOutcome, WebhookError> {
        // 1. Verify signature and freshness, then parse the envelope
        let verifier = self.verifier.as_ref().ok_or(WebhookError::NotConfigured)?;
        let headers = verifier.verify(&cmd.body, &cmd.headers)?;
        let event = WebhookEvent::parse(&headers, cmd.body)?;

        // 2. Claim the event id
        match self.idempotency.begin(&event.id, &event.event_type).await? {
            BeginResult::Proceed => {}
            BeginResult::AlreadyProcessed(outcome) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    outcome = %outcome,
                    "Duplicate webhook delivery acknowledged"
                );
                return Ok(WebhookOutcome::AlreadyProcessed { event_id: event.id });
            }
        }

        // 3. Route, apply, and record the outcome
        match self.process(&event, cancel).await {
            Ok((outcome, summary)) => {
                self.idempotency
                    .commit(&event.id, ProcessingOutcome::Processed, &summary)
                    .await?;
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    summary = %summary,
                    "Webhook processed"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(commit_err) = self
                    .idempotency
                    .commit(&event.id, ProcessingOutcome::Failed, &err.to_string())
                    .await
                {
                    tracing::error!(
                        event_id = %event.id,
                        error = %commit_err,
                        "Failed to record webhook failure"
                    );
                }
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Webhook processing failed"
                );
                Err(err)
            }
        }
    }

    async fn process(
        &self,
        event: &WebhookEvent,
        cancel: CancelSignal,
    ) -> Result<(WebhookOutcome, String), WebhookError> {
        let kind = match classify(event)? {
            Classified::Known(kind) => kind,
            Classified::Unknown(event_type) => {
                let ignored = WebhookError::UnknownEventType(event_type.clone());
                tracing::warn!(event_id = %event.id, reason = %ignored, "Webhook ignored");
                return Ok((
                    WebhookOutcome::Ignored {
                        event_id: event.id.clone(),
                        event_type,
                    },
                    format!("ignored {}", ignored),
                ));
            }
        };

        let ctx = TransitionContext {
            event_id: event.id.clone(),
            occurred_at: event.created_at,
            now: Utc::now(),
            revocation_policy: self.revocation_policy,
        };

        let write = self.transition(&kind, &ctx).await?;

        self.notifier
            .apply(&event.id, write.effects(), cancel)
            .await?;

        let summary = write.summary().to_string();
        self.persist(write, &event.id).await?;

        Ok((
            WebhookOutcome::Processed {
                event_id: event.id.clone(),
            },
            summary,
        ))
    }

    async fn transition(
        &self,
        kind: &EventKind,
        ctx: &TransitionContext,
    ) -> Result<StateWrite, WebhookError> {
        let (trigger, payload) = match kind {
            EventKind::SubscriptionCreated(p) => (SubscriptionTrigger::Created, p),
            EventKind::SubscriptionActive(p) => (SubscriptionTrigger::Active, p),
            EventKind::SubscriptionRenewed(p) => (SubscriptionTrigger::Renewed, p),
            EventKind::SubscriptionOnHold(p) => (SubscriptionTrigger::OnHold, p),
            EventKind::SubscriptionCancelled(p) => (SubscriptionTrigger::Cancelled, p),
            EventKind::PaymentSucceeded(p) | EventKind::PaymentFailed(p) => {
                let trigger = if matches!(kind, EventKind::PaymentSucceeded(_)) {
                    PaymentTrigger::Succeeded
                } else {
                    PaymentTrigger::Failed
                };
                let current = self.payments.find_by_id(&p.payment_id).await?;
                return Ok(StateWrite::Payment(apply_payment_event(
                    current.as_ref(),
                    trigger,
                    p,
                    ctx,
                )));
            }
        };

        let current = self.subscriptions.find_by_id(&payload.subscription_id).await?;
        let transition = apply_subscription_event(current.as_ref(), trigger, payload, ctx)?;
        Ok(StateWrite::Subscription(transition))
    }

    async fn persist(&self, write: StateWrite, event_id: &str) -> Result<(), WebhookError> {
        let written = match write {
            StateWrite::Subscription(Transition {
                state: Some(subscription),
                ..
            }) => self.subscriptions.upsert(&subscription).await?,
            StateWrite::Payment(Transition {
                state: Some(payment),
                ..
            }) => self.payments.upsert(&payment).await?,
            _ => return Ok(()),
        };

        if !written {
            tracing::warn!(
                event_id = event_id,
                "Entity reached a terminal state concurrently; write skipped"
            );
        }
        Ok(())
    }
}
