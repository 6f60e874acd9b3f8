//! Subscription repository port.
//!
//! Persists the entity the subscription state machine reads and writes.
//!
//! # Design
//!
//! - **Terminal guard**: `upsert` never overwrites a `cancelled` row, even if
//!   a caller computed a transition from stale state
//! - **Single writer per event**: callers only write after winning
//!   `IdempotencyStore::begin`

use async_trait::async_trait;

use crate::domain::billing::Subscription;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by provider id.
    ///
    /// Returns `None` if never seen.
    async fn find_by_id(&self, id: &str) -> Result<Option<Subscription>, DomainError>;

    /// Insert or update a subscription.
    ///
    /// Returns `false` when the stored row is `cancelled` and was left
    /// untouched.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn upsert(&self, subscription: &Subscription) -> Result<bool, DomainError>;
}
