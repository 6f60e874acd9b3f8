//! HTTP adapter for billing provider webhooks.
//!
//! - `POST /webhook/dodo` - Receive a signed billing event

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{ErrorResponse, WebhookResponse};
pub use handlers::{handle_dodo_webhook, WebhookApiError, WebhookAppState};
pub use routes::webhook_router;
