//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `entitlement` - Internal entitlement API client (HTTP, mock)
//! - `http` - Axum routers for the webhook and health endpoints
//! - `memory` - In-memory stores for development and tests
//! - `postgres` - PostgreSQL stores

pub mod entitlement;
pub mod http;
pub mod memory;
pub mod postgres;

pub use entitlement::{HttpEntitlementClient, MockEntitlementApi};
pub use http::app_router;
pub use memory::{InMemoryIdempotencyStore, InMemoryPaymentRepository, InMemorySubscriptionRepository};
pub use postgres::{PostgresIdempotencyStore, PostgresPaymentRepository, PostgresSubscriptionRepository};
