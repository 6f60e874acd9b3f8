//! Health endpoint.
//!
//! - `GET /health` - Liveness plus which integrations are configured

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "billing-webhooks";

/// Which secrets and endpoints are present. Never exposes their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    pub webhook_key_configured: bool,
    pub python_backend_configured: bool,
    pub internal_api_key_configured: bool,
}

impl ConfigurationStatus {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            webhook_key_configured: config.webhook.is_configured(),
            python_backend_configured: config.entitlement.is_configured(),
            internal_api_key_configured: config.entitlement.api_key.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub configuration: ConfigurationStatus,
}

#[derive(Debug, Clone)]
pub struct HealthState {
    pub configuration: ConfigurationStatus,
}

/// GET /health
pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        configuration: state.configuration,
    })
}

pub fn health_router() -> Router<HealthState> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn status_reflects_configured_integrations() {
        let mut config = AppConfig::default();
        config.webhook.secret = Some(SecretString::new("whsec_x".to_string()));
        config.entitlement.base_url = Some("http://backend:8000".to_string());

        let status = ConfigurationStatus::from_config(&config);

        assert!(status.webhook_key_configured);
        assert!(status.python_backend_configured);
        assert!(!status.internal_api_key_configured);
    }

    #[test]
    fn empty_backend_url_is_not_configured() {
        let mut config = AppConfig::default();
        config.entitlement.base_url = Some(String::new());

        let status = ConfigurationStatus::from_config(&config);

        assert!(!status.python_backend_configured);
    }

    #[test]
    fn serializes_camel_case_flags() {
        let json = serde_json::to_value(ConfigurationStatus {
            webhook_key_configured: true,
            python_backend_configured: false,
            internal_api_key_configured: false,
        })
        .unwrap();

        assert_eq!(json["webhookKeyConfigured"], true);
        assert_eq!(json["pythonBackendConfigured"], false);
        assert_eq!(json["internalApiKeyConfigured"], false);
    }
}
