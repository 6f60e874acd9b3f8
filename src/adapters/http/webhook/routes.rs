//! Axum router configuration for webhook endpoints.

use axum::{routing::post, Router};

use super::handlers::{handle_dodo_webhook, WebhookAppState};

/// Create the webhook router.
///
/// # Routes
/// - `POST /webhook/dodo` - Handle billing provider webhooks (signature verified)
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new().route("/webhook/dodo", post(handle_dodo_webhook))
}
