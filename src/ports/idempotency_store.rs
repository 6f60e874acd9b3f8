//! IdempotencyStore port - Tracks which webhook events have been handled.
//!
//! The provider delivers at least once and may deliver the same event to
//! several replicas at the same time. `begin` is the only cross-request
//! coordination point: exactly one concurrent caller gets `Proceed`.
//!
//! ## Record lifecycle
//!
//! ```text
//! (absent) --begin--> processing --commit--> processed
//!                         │
//!                         └------commit-------> failed --begin--> processing
//! ```
//!
//! A `failed` record can be claimed again so the provider's redelivery
//! (triggered by our 5xx) gets to run. A `processing` record older than the
//! adapter's lease is treated as abandoned and can be claimed too.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode};

/// Outcome stored against an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Processing,
    Processed,
    Failed,
}

impl ProcessingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingOutcome::Processing => "processing",
            ProcessingOutcome::Processed => "processed",
            ProcessingOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingOutcome {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ProcessingOutcome::Processing),
            "processed" => Ok(ProcessingOutcome::Processed),
            "failed" => Ok(ProcessingOutcome::Failed),
            other => Err(DomainError::new(
                ErrorCode::InvalidFormat,
                format!("Invalid processing outcome: {}", other),
            )),
        }
    }
}

/// Stored record for one event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub event_id: String,
    pub event_type: String,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of times processing was claimed.
    pub attempts: i32,
    pub outcome: ProcessingOutcome,
    pub result_summary: Option<String>,
}

/// Result of trying to claim an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginResult {
    /// This caller owns processing and must `commit`.
    Proceed,
    /// Someone else has handled, or is handling, this event.
    AlreadyProcessed(ProcessingOutcome),
}

/// Port for webhook idempotency tracking.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically claims an event id for processing.
    ///
    /// Must be a single conditional write. Read-then-write lets two replicas
    /// both proceed.
    async fn begin(&self, event_id: &str, event_type: &str) -> Result<BeginResult, DomainError>;

    /// Records the final outcome of a claimed event.
    async fn commit(
        &self,
        event_id: &str,
        outcome: ProcessingOutcome,
        summary: &str,
    ) -> Result<(), DomainError>;

    /// Looks up the record for an event id.
    async fn find(&self, event_id: &str) -> Result<Option<IdempotencyRecord>, DomainError>;

    /// Deletes records first seen before `cutoff`. Returns the number deleted.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}
