//! Payment repository port.
//!
//! `upsert` never overwrites a `succeeded` row: a succeeded payment is
//! terminal and its credits were already granted.

use async_trait::async_trait;

use crate::domain::billing::Payment;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Find a payment by provider id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>, DomainError>;

    /// Insert or update a payment.
    ///
    /// Returns `false` when the stored row is `succeeded` and was left
    /// untouched.
    async fn upsert(&self, payment: &Payment) -> Result<bool, DomainError>;
}
