//! Billing handlers.
//!
//! ## Commands
//! - Processing billing provider webhooks

mod process_webhook;

pub use process_webhook::{ProcessWebhookCommand, ProcessWebhookHandler, WebhookOutcome};
