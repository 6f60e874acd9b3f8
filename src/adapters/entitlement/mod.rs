//! Entitlement API adapters.
//!
//! - `HttpEntitlementClient` - `reqwest` client for the application backend
//! - `MockEntitlementApi` - Call-recording double with failure injection

mod http_client;
mod mock_entitlement_api;

pub use http_client::{HttpEntitlementClient, API_KEY_HEADER, IDEMPOTENCY_KEY_HEADER};
pub use mock_entitlement_api::{MockEntitlementApi, RecordedCall};
