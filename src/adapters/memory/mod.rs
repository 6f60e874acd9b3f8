//! In-memory adapters for development and tests.

mod billing_repository;
mod idempotency_store;

pub use billing_repository::{InMemoryPaymentRepository, InMemorySubscriptionRepository};
pub use idempotency_store::{InMemoryIdempotencyStore, DEFAULT_PROCESSING_LEASE_SECS};
