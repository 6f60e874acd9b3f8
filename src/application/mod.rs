//! Application layer - Command handlers and background services.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;
pub mod janitor;
pub mod notifier;

pub use handlers::{ProcessWebhookCommand, ProcessWebhookHandler, WebhookOutcome};
pub use janitor::IdempotencyJanitor;
pub use notifier::{cancellation, CancelGuard, CancelSignal, DownstreamNotifier, NotifyError, RetryPolicy};
