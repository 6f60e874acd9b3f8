//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `IdempotencyStore` - Webhook event deduplication
//! - `SubscriptionRepository` - Subscription entity storage
//! - `PaymentRepository` - Payment entity storage
//!
//! ## Outbound Ports
//!
//! - `EntitlementApi` - The backend that grants and revokes access

mod entitlement_api;
mod idempotency_store;
mod payment_repository;
mod subscription_repository;

pub use entitlement_api::{EntitlementApi, EntitlementApiError, EntitlementUpdate, UPDATE_SOURCE};
pub use idempotency_store::{BeginResult, IdempotencyRecord, IdempotencyStore, ProcessingOutcome};
pub use payment_repository::PaymentRepository;
pub use subscription_repository::SubscriptionRepository;
