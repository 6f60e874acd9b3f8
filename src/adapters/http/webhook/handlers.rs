//! HTTP handlers for webhook endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::{cancellation, ProcessWebhookCommand, ProcessWebhookHandler};
use crate::domain::billing::WebhookError;

use super::dto::{ErrorResponse, WebhookResponse};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for webhook endpoints.
#[derive(Clone)]
pub struct WebhookAppState {
    pub handler: Arc<ProcessWebhookHandler>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhook/dodo - Handle billing provider webhooks
///
/// Processing runs on its own task so a client disconnect cannot abort it
/// between the state write and the idempotency commit. Disconnecting drops
/// `_guard`, which only stops downstream retries.
pub async fn handle_dodo_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let (_guard, signal) = cancellation();
    let handler = state.handler.clone();
    let cmd = ProcessWebhookCommand { headers, body };

    let outcome = tokio::spawn(async move { handler.handle(cmd, signal).await })
        .await
        .map_err(|e| WebhookError::Internal(format!("webhook task failed: {}", e)))??;

    Ok((StatusCode::OK, Json(WebhookResponse::from(&outcome))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts webhook errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let message = match &self.0 {
            // Storage and task failures carry internals
            WebhookError::Storage(_) | WebhookError::Internal(_) => {
                tracing::error!(error = %self.0, "Webhook failed with internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse::new(self.0.error_code(), message);
        (status, Json(body)).into_response()
    }
}
