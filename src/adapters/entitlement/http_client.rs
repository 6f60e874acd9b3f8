//! HTTP client for the internal entitlement API.
//!
//! Sends `POST {base_url}{path}` with the update as JSON, the shared
//! `X-Internal-API-Key`, and the effect's `Idempotency-Key`. Responses are
//! only classified here; retries belong to the notifier.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::EntitlementConfig;
use crate::ports::{EntitlementApi, EntitlementApiError, EntitlementUpdate};

pub const API_KEY_HEADER: &str = "X-Internal-API-Key";
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Longest response body excerpt kept in error messages.
const MAX_ERROR_BODY: usize = 200;

pub struct HttpEntitlementClient {
    http_client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<SecretString>,
}

impl HttpEntitlementClient {
    /// Creates a client from configuration.
    ///
    /// An unconfigured base URL is not an error: every send then fails as
    /// `Unavailable`, so events are refused with 503 and redelivered later.
    pub fn new(config: &EntitlementConfig) -> Result<Self, EntitlementApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| EntitlementApiError::Unavailable(format!("HTTP client: {}", e)))?;

        if config.endpoint().is_none() {
            tracing::warn!("Entitlement API base URL not configured; side effects will fail");
        }

        Ok(Self {
            http_client,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl EntitlementApi for HttpEntitlementClient {
    async fn send(
        &self,
        update: &EntitlementUpdate,
        idempotency_key: &str,
    ) -> Result<(), EntitlementApiError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            EntitlementApiError::Unavailable("entitlement API not configured".to_string())
        })?;

        let mut request = self
            .http_client
            .post(endpoint)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(update);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret().as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EntitlementApiError::Unavailable("request timed out".to_string())
            } else {
                EntitlementApiError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                action = update.action,
                idempotency_key = idempotency_key,
                "Entitlement update accepted"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status.as_u16(), &body))
    }
}

/// Maps a non-success status to a retryable or fatal error.
fn classify_failure(status: u16, body: &str) -> EntitlementApiError {
    let message: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status {
        408 | 429 | 500..=599 => {
            EntitlementApiError::Unavailable(format!("HTTP {}: {}", status, message))
        }
        _ => EntitlementApiError::Rejected { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    use crate::domain::billing::SideEffect;

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(HeaderMap, serde_json::Value)>>>,
    }

    async fn spawn_backend(status: StatusCode) -> (String, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route(
                "/api/internal/entitlements",
                post(
                    move |State(c): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<serde_json::Value>| async move {
                        c.requests.lock().unwrap().push((headers, body));
                        (status, "backend says no")
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), captured)
    }

    fn client(base_url: Option<String>) -> HttpEntitlementClient {
        HttpEntitlementClient::new(&EntitlementConfig {
            base_url,
            api_key: Some(SecretString::new("internal_key".to_string())),
            ..Default::default()
        })
        .unwrap()
    }

    fn update() -> EntitlementUpdate {
        let effect = SideEffect::TopUpCredits {
            customer_id: "cus_1".to_string(),
            plan_type: "credits".to_string(),
            payment_id: "pay_1".to_string(),
            amount: 499,
            currency: "USD".to_string(),
        };
        EntitlementUpdate::from_effect(&effect, "evt_1", Utc::now())
    }

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        for status in [408, 429, 500, 502, 503] {
            assert!(classify_failure(status, "").is_retryable(), "{}", status);
        }
    }

    #[test]
    fn client_errors_are_fatal() {
        let err = classify_failure(422, "unknown plan");
        assert_eq!(
            err,
            EntitlementApiError::Rejected {
                status: 422,
                message: "unknown plan".to_string()
            }
        );
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let err = classify_failure(400, &"x".repeat(1000));
        let EntitlementApiError::Rejected { message, .. } = err else {
            panic!("expected Rejected");
        };
        assert_eq!(message.len(), MAX_ERROR_BODY);
    }

    #[tokio::test]
    async fn unconfigured_endpoint_is_unavailable() {
        let result = client(None).send(&update(), "payment:pay_1:top_up_credits").await;

        assert!(matches!(result, Err(EntitlementApiError::Unavailable(_))));
    }

    #[tokio::test]
    async fn sends_headers_and_json_body() {
        let (base_url, captured) = spawn_backend(StatusCode::OK).await;

        client(Some(base_url))
            .send(&update(), "payment:pay_1:top_up_credits")
            .await
            .unwrap();

        let requests = captured.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (headers, body) = &requests[0];
        assert_eq!(headers[API_KEY_HEADER], "internal_key");
        assert_eq!(headers[IDEMPOTENCY_KEY_HEADER], "payment:pay_1:top_up_credits");
        assert_eq!(body["action"], "top_up_credits");
        assert_eq!(body["amount"], 499);
        assert_eq!(body["source"], "dodo_webhook");
    }

    #[tokio::test]
    async fn backend_503_is_unavailable() {
        let (base_url, _) = spawn_backend(StatusCode::SERVICE_UNAVAILABLE).await;

        let result = client(Some(base_url)).send(&update(), "k").await;

        assert!(matches!(result, Err(EntitlementApiError::Unavailable(m)) if m.contains("503")));
    }

    #[tokio::test]
    async fn backend_400_is_rejected() {
        let (base_url, _) = spawn_backend(StatusCode::BAD_REQUEST).await;

        let result = client(Some(base_url)).send(&update(), "k").await;

        assert_eq!(
            result,
            Err(EntitlementApiError::Rejected {
                status: 400,
                message: "backend says no".to_string()
            })
        );
    }
}
