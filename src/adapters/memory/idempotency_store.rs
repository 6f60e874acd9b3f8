//! In-memory idempotency store.
//!
//! For development without a database and for tests. The mutex stands in
//! for the row lock PostgreSQL takes during `INSERT ... ON CONFLICT`, so
//! `begin` keeps the same one-winner guarantee.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{BeginResult, IdempotencyRecord, IdempotencyStore, ProcessingOutcome};

/// Default time after which a `processing` claim is considered abandoned.
pub const DEFAULT_PROCESSING_LEASE_SECS: i64 = 60;

pub struct InMemoryIdempotencyStore {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
    lease: Duration,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::with_lease(Duration::seconds(DEFAULT_PROCESSING_LEASE_SECS))
    }

    pub fn with_lease(lease: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            lease,
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    fn reclaimable(&self, record: &IdempotencyRecord, now: DateTime<Utc>) -> bool {
        match record.outcome {
            ProcessingOutcome::Failed => true,
            ProcessingOutcome::Processing => record.updated_at + self.lease <= now,
            ProcessingOutcome::Processed => false,
        }
    }
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(&self, event_id: &str, event_type: &str) -> Result<BeginResult, DomainError> {
        let now = Utc::now();
        let mut records = self.records.lock().await;

        let Some(record) = records.get(event_id) else {
            records.insert(
                event_id.to_string(),
                IdempotencyRecord {
                    event_id: event_id.to_string(),
                    event_type: event_type.to_string(),
                    first_seen_at: now,
                    updated_at: now,
                    attempts: 1,
                    outcome: ProcessingOutcome::Processing,
                    result_summary: None,
                },
            );
            return Ok(BeginResult::Proceed);
        };

        if !self.reclaimable(record, now) {
            return Ok(BeginResult::AlreadyProcessed(record.outcome));
        }

        if let Some(record) = records.get_mut(event_id) {
            record.outcome = ProcessingOutcome::Processing;
            record.attempts += 1;
            record.updated_at = now;
            record.result_summary = None;
        }
        Ok(BeginResult::Proceed)
    }

    async fn commit(
        &self,
        event_id: &str,
        outcome: ProcessingOutcome,
        summary: &str,
    ) -> Result<(), DomainError> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(event_id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("No idempotency record for event {}", event_id),
            )
        })?;
        record.outcome = outcome;
        record.result_summary = Some(summary.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<IdempotencyRecord>, DomainError> {
        Ok(self.records.lock().await.get(event_id).cloned())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.first_seen_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn first_begin_proceeds() {
        let store = InMemoryIdempotencyStore::new();

        let result = store.begin("evt_1", "payment.succeeded").await.unwrap();

        assert_eq!(result, BeginResult::Proceed);
        let record = store.find("evt_1").await.unwrap().unwrap();
        assert_eq!(record.outcome, ProcessingOutcome::Processing);
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn second_begin_while_processing_is_rejected() {
        let store = InMemoryIdempotencyStore::new();
        store.begin("evt_1", "payment.succeeded").await.unwrap();

        let result = store.begin("evt_1", "payment.succeeded").await.unwrap();

        assert_eq!(result, BeginResult::AlreadyProcessed(ProcessingOutcome::Processing));
    }

    #[tokio::test]
    async fn processed_event_is_never_reclaimed() {
        let store = InMemoryIdempotencyStore::with_lease(Duration::zero());
        store.begin("evt_1", "payment.succeeded").await.unwrap();
        store
            .commit("evt_1", ProcessingOutcome::Processed, "done")
            .await
            .unwrap();

        let result = store.begin("evt_1", "payment.succeeded").await.unwrap();

        assert_eq!(result, BeginResult::AlreadyProcessed(ProcessingOutcome::Processed));
    }

    #[tokio::test]
    async fn failed_event_is_reclaimed_and_counts_attempts() {
        let store = InMemoryIdempotencyStore::new();
        store.begin("evt_1", "payment.succeeded").await.unwrap();
        store
            .commit("evt_1", ProcessingOutcome::Failed, "503")
            .await
            .unwrap();

        let result = store.begin("evt_1", "payment.succeeded").await.unwrap();

        assert_eq!(result, BeginResult::Proceed);
        let record = store.find("evt_1").await.unwrap().unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.result_summary, None);
    }

    #[tokio::test]
    async fn expired_processing_lease_is_reclaimed() {
        let store = InMemoryIdempotencyStore::with_lease(Duration::zero());
        store.begin("evt_1", "payment.succeeded").await.unwrap();

        let result = store.begin("evt_1", "payment.succeeded").await.unwrap();

        assert_eq!(result, BeginResult::Proceed);
    }

    #[tokio::test]
    async fn concurrent_begin_has_exactly_one_winner() {
        let store = Arc::new(InMemoryIdempotencyStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.begin("evt_1", "payment.succeeded").await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == BeginResult::Proceed {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn commit_without_begin_fails() {
        let store = InMemoryIdempotencyStore::new();

        let result = store.commit("evt_x", ProcessingOutcome::Processed, "").await;

        assert_eq!(result.unwrap_err().code, ErrorCode::InternalError);
    }

    #[tokio::test]
    async fn purge_removes_only_older_records() {
        let store = InMemoryIdempotencyStore::new();
        store.begin("evt_old", "payment.succeeded").await.unwrap();
        let cutoff = Utc::now() + Duration::seconds(1);

        let purged = store.purge_before(cutoff).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.len().await, 0);

        store.begin("evt_new", "payment.succeeded").await.unwrap();
        let purged = store.purge_before(Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(purged, 0);
        assert_eq!(store.len().await, 1);
    }
}
