//! Downstream notifier - applies side effects against the entitlement API.
//!
//! # Failure handling
//!
//! | Failure | Handling |
//! |---------|----------|
//! | Network error, timeout, 429, 5xx | Retried with exponential backoff |
//! | Other 4xx | Not retried; logged at `error` |
//! | Best-effort effect fails | Logged at `warn`; the event still succeeds |
//!
//! All effects of one event share a single deadline, kept shorter than the
//! provider's client timeout so the provider sees our status code rather
//! than its own timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::config::EntitlementConfig;
use crate::domain::billing::{SideEffect, WebhookError};
use crate::ports::{EntitlementApi, EntitlementApiError, EntitlementUpdate};

/// Retry settings for one side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0 for the first retry).
    ///
    /// `base * 2^retry`, capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base_ms = self.base_backoff.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(2_u64.saturating_pow(retry));
        Duration::from_millis(delay_ms).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl From<&EntitlementConfig> for RetryPolicy {
    fn from(config: &EntitlementConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Why applying side effects failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    /// Transient failure that outlasted the retries, deadline, or request.
    #[error("{0}")]
    Retryable(String),

    /// The entitlement API refused the update.
    #[error("{0}")]
    Fatal(String),
}

impl From<NotifyError> for WebhookError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::Retryable(msg) => WebhookError::DownstreamRetryable(msg),
            NotifyError::Fatal(msg) => WebhookError::DownstreamFatal(msg),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Cancellation
// ════════════════════════════════════════════════════════════════════════════════

/// Receiving half of a request's cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Dropping the sender freezes the value at false
        drop(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the guard
    /// was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sending half; fires the signal when dropped.
///
/// The HTTP handler holds the guard for the lifetime of the request, so a
/// client disconnect (which drops the handler future) cancels downstream
/// retries of the spawned processing task.
#[derive(Debug)]
pub struct CancelGuard {
    tx: watch::Sender<bool>,
}

impl CancelGuard {
    pub fn cancel(&self) {
        // No receivers left means nothing is listening
        let _ = self.tx.send(true);
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Creates a linked guard and signal.
pub fn cancellation() -> (CancelGuard, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelGuard { tx }, CancelSignal { rx })
}

// ════════════════════════════════════════════════════════════════════════════════
// Notifier
// ════════════════════════════════════════════════════════════════════════════════

/// Applies side effects in order with retries under a shared deadline.
#[derive(Clone)]
pub struct DownstreamNotifier {
    api: Arc<dyn EntitlementApi>,
    policy: RetryPolicy,
    deadline: Duration,
}

impl DownstreamNotifier {
    pub fn new(api: Arc<dyn EntitlementApi>, policy: RetryPolicy, deadline: Duration) -> Self {
        Self {
            api,
            policy,
            deadline,
        }
    }

    /// Applies every effect produced by `event_id`.
    ///
    /// Stops at the first required effect that fails. Best-effort effects
    /// that fail are logged and skipped.
    pub async fn apply(
        &self,
        event_id: &str,
        effects: &[SideEffect],
        mut cancel: CancelSignal,
    ) -> Result<(), NotifyError> {
        let deadline = Instant::now() + self.deadline;

        for effect in effects {
            let update = EntitlementUpdate::from_effect(effect, event_id, Utc::now());
            let key = effect.idempotency_key();

            let result = match time::timeout_at(
                deadline,
                self.send_with_retry(&update, &key, &mut cancel),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Retryable(format!(
                    "deadline of {}ms exceeded",
                    self.deadline.as_millis()
                ))),
            };

            match result {
                Ok(()) => {
                    tracing::info!(
                        event_id = event_id,
                        action = effect.action(),
                        customer_id = effect.customer_id(),
                        "Side effect applied"
                    );
                }
                Err(err) if effect.is_best_effort() => {
                    tracing::warn!(
                        event_id = event_id,
                        action = effect.action(),
                        error = %err,
                        "Best-effort side effect failed; continuing"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    async fn send_with_retry(
        &self,
        update: &EntitlementUpdate,
        key: &str,
        cancel: &mut CancelSignal,
    ) -> Result<(), NotifyError> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(NotifyError::Retryable("request cancelled".to_string()));
            }
            attempt += 1;

            match self.api.send(update, key).await {
                Ok(()) => return Ok(()),
                Err(EntitlementApiError::Rejected { status, message }) => {
                    tracing::error!(
                        action = update.action,
                        idempotency_key = key,
                        status = status,
                        message = %message,
                        "Entitlement API rejected update"
                    );
                    return Err(NotifyError::Fatal(format!(
                        "entitlement API returned {}: {}",
                        status, message
                    )));
                }
                Err(EntitlementApiError::Unavailable(message)) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(NotifyError::Retryable(format!(
                            "{} after {} attempts",
                            message, attempt
                        )));
                    }

                    let delay = self.policy.backoff(attempt - 1);
                    tracing::warn!(
                        action = update.action,
                        idempotency_key = key,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Retrying entitlement update after transient error"
                    );

                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            return Err(NotifyError::Retryable("request cancelled".to_string()));
                        }
                    }
                }
            }
        }
    }
}
