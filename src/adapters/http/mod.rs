//! HTTP adapters - REST API implementations.
//!
//! Each endpoint group has its own router; `app_router` merges them and
//! applies the shared middleware stack.

pub mod health;
pub mod webhook;

use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Router};
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub use health::{health_router, ConfigurationStatus, HealthResponse, HealthState, SERVICE_NAME};
pub use webhook::{webhook_router, WebhookAppState};

use webhook::ErrorResponse;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the complete application router.
///
/// A request that outlives `request_timeout` is answered with 503 so the
/// provider redelivers it; a 4xx would be treated as final.
pub fn app_router(
    webhook_state: WebhookAppState,
    health_state: HealthState,
    request_timeout: Duration,
) -> Router {
    Router::new()
        .merge(webhook_router().with_state(webhook_state))
        .merge(health_router().with_state(health_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

async fn handle_middleware_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        tracing::warn!("Request timed out before processing finished");
        let body = ErrorResponse::new("DOWNSTREAM_UNAVAILABLE", "Request timed out");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    tracing::error!(error = %err, "Unhandled middleware error");
    let body = ErrorResponse::new("INTERNAL_ERROR", "Internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
