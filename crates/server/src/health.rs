use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use caserelay_core::config::LlmConfig;
use caserelay_core::credentials::CredentialStore;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct HealthState {
    credentials: Arc<CredentialStore>,
    gateway: GatewaySettings,
}

#[derive(Clone, Debug)]
pub struct GatewaySettings {
    pub provider: &'static str,
    pub endpoint: String,
    pub model: String,
}

impl GatewaySettings {
    pub fn new(llm: &LlmConfig, endpoint: &str) -> Self {
        Self {
            provider: llm.provider.as_str(),
            endpoint: endpoint.to_string(),
            model: llm.model.clone(),
        }
    }
}

impl HealthState {
    pub fn new(credentials: Arc<CredentialStore>, gateway: GatewaySettings) -> Self {
        Self { credentials, gateway }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthCheck {
    pub status: String,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: HealthCheck,
    pub credentials: HealthCheck,
    pub gateway: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Readiness of the service, its credential store and gateway settings.
#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is degraded", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let credentials = credential_check(&state.credentials);
    let gateway = gateway_check(&state.gateway);
    let ready = credentials.status == "ready" && gateway.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" }.to_string(),
        service: ready_check("caserelay-server runtime initialized".to_string()),
        credentials,
        gateway,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// The store cannot exist without a non-blank key, so this only reports it.
fn credential_check(_credentials: &CredentialStore) -> HealthCheck {
    ready_check("llm api key loaded".to_string())
}

fn gateway_check(gateway: &GatewaySettings) -> HealthCheck {
    let reachable_scheme =
        gateway.endpoint.starts_with("https://") || gateway.endpoint.starts_with("http://");
    if !reachable_scheme {
        return degraded_check(format!("gateway endpoint `{}` is not http(s)", gateway.endpoint));
    }
    if gateway.model.trim().is_empty() {
        return degraded_check("no model configured".to_string());
    }
    ready_check(format!("{} {} (model {})", gateway.provider, gateway.endpoint, gateway.model))
}

fn ready_check(detail: String) -> HealthCheck {
    HealthCheck { status: "ready".to_string(), detail }
}

fn degraded_check(detail: String) -> HealthCheck {
    HealthCheck { status: "degraded".to_string(), detail }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use caserelay_core::credentials::CredentialStore;
    use secrecy::SecretString;

    use crate::health::{health, GatewaySettings, HealthState};

    fn settings(endpoint: &str) -> GatewaySettings {
        GatewaySettings {
            provider: "anthropic",
            endpoint: endpoint.to_string(),
            model: "claude-test".to_string(),
        }
    }

    fn credentials() -> Arc<CredentialStore> {
        Arc::new(
            CredentialStore::new(SecretString::from("sk-health-test-9876".to_string()))
                .expect("credential store"),
        )
    }

    #[tokio::test]
    async fn health_returns_ready_when_credentials_and_gateway_are_configured() {
        let state =
            HealthState::new(credentials(), settings("https://api.anthropic.com/v1/messages"));

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.credentials.status, "ready");
        assert_eq!(payload.gateway.status, "ready");
        assert!(payload.gateway.detail.contains("claude-test"));
        assert!(!payload.credentials.detail.contains("sk-health"));
    }

    #[tokio::test]
    async fn health_flags_missing_model() {
        let mut gateway = settings("https://api.anthropic.com/v1/messages");
        gateway.model = "  ".to_string();
        let state = HealthState::new(credentials(), gateway);

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.credentials.status, "ready");
        assert_eq!(payload.gateway.status, "degraded");
    }

    #[tokio::test]
    async fn health_flags_non_http_gateway_endpoint() {
        let state = HealthState::new(credentials(), settings("ftp://example.com"));

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.gateway.status, "degraded");
    }
}
