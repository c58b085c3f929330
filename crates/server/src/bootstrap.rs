use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use caserelay_core::config::{AppConfig, ConfigError, LoadOptions};
use caserelay_core::credentials::CredentialStore;
use caserelay_core::errors::GatewayError;
use caserelay_gateway::{CaseRuntime, GatewayClient, HttpGateway};
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cases::{self, REQUEST_ID_HEADER};
use crate::docs;
use crate::health::{self, GatewaySettings, HealthState};

pub struct Application {
    pub config: AppConfig,
    pub credentials: Arc<CredentialStore>,
    pub gateway: GatewaySettings,
    pub runtime: Arc<CaseRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("gateway client could not be built: {0}")]
    Gateway(#[from] GatewayError),
    #[error("invalid CORS origin `{0}`")]
    InvalidCorsOrigin(String),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let credentials = Arc::new(CredentialStore::from_config(&config.llm)?);
    info!(
        event_name = "system.bootstrap.credentials_loaded",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        "llm credential store initialized"
    );

    let http_gateway = HttpGateway::from_config(&config.llm)?;
    let gateway = GatewaySettings::new(&config.llm, http_gateway.endpoint());
    info!(
        event_name = "system.bootstrap.gateway_ready",
        correlation_id = "bootstrap",
        endpoint = %gateway.endpoint,
        model = %gateway.model,
        max_retries = config.llm.max_retries,
        "llm gateway configured"
    );

    let client: Arc<dyn GatewayClient> = Arc::new(http_gateway);
    let runtime = Arc::new(CaseRuntime::new(client, credentials.clone(), &config));

    Ok(Application { config, credentials, gateway, runtime })
}

impl Application {
    pub fn router(&self) -> Result<Router, BootstrapError> {
        let cors = cors_layer(&self.config.server.cors_allowed_origins)?;
        let health_state = HealthState::new(self.credentials.clone(), self.gateway.clone());

        Ok(cases::router(self.runtime.clone())
            .merge(health::router(health_state))
            .merge(docs::router())
            .layer(cors)
            .layer(TraceLayer::new_for_http()))
    }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, BootstrapError> {
    let allowed = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| BootstrapError::InvalidCorsOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)]))
}
