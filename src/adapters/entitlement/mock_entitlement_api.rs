//! Mock entitlement API for testing.
//!
//! Records every call and can inject failures or latency. Supports:
//! - Queued one-shot failures (`fail_next`)
//! - A standing failure for all calls (`fail_always`)
//! - Artificial latency per call (`with_latency`)

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{EntitlementApi, EntitlementApiError, EntitlementUpdate};

/// Recorded call for assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub update: EntitlementUpdate,
    pub idempotency_key: String,
}

#[derive(Default)]
struct MockState {
    queued_failures: VecDeque<EntitlementApiError>,
    standing_failure: Option<EntitlementApiError>,
    latency: Option<Duration>,
    calls: Vec<RecordedCall>,
}

/// Mock entitlement API.
///
/// # Example
///
/// ```ignore
/// let api = Arc::new(MockEntitlementApi::new());
/// api.fail_next(EntitlementApiError::Unavailable("503".into()));
///
/// // First call fails, the retry succeeds
/// assert_eq!(api.call_count(), 2);
/// ```
#[derive(Clone, Default)]
pub struct MockEntitlementApi {
    inner: Arc<Mutex<MockState>>,
}

impl MockEntitlementApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Fail the next call with `error`. Calls queue in order.
    pub fn fail_next(&self, error: EntitlementApiError) {
        self.state().queued_failures.push_back(error);
    }

    /// Fail every call with `error` until cleared.
    pub fn fail_always(&self, error: EntitlementApiError) {
        self.state().standing_failure = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.queued_failures.clear();
        state.standing_failure = None;
    }

    /// Delay every call by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state().latency = Some(latency);
        self
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Calls whose update carried `action`.
    pub fn calls_for_action(&self, action: &str) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.update.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EntitlementApi for MockEntitlementApi {
    async fn send(
        &self,
        update: &EntitlementUpdate,
        idempotency_key: &str,
    ) -> Result<(), EntitlementApiError> {
        let (latency, outcome) = {
            let mut state = self.state();
            state.calls.push(RecordedCall {
                update: update.clone(),
                idempotency_key: idempotency_key.to_string(),
            });
            let outcome = match state.queued_failures.pop_front() {
                Some(err) => Err(err),
                None => match &state.standing_failure {
                    Some(err) => Err(err.clone()),
                    None => Ok(()),
                },
            };
            (state.latency, outcome)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}
