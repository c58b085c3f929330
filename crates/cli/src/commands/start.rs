use caserelay_core::config::{AppConfig, LoadOptions};
use caserelay_core::credentials::CredentialStore;
use caserelay_gateway::HttpGateway;

use crate::commands::CommandResult;

/// Startup preflight. Mirrors what `caserelay-server` checks before it binds.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "start",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let credentials = match CredentialStore::from_config(&config.llm) {
        Ok(credentials) => credentials,
        Err(error) => {
            return CommandResult::failure("start", "credential_store", error.to_string(), 2);
        }
    };

    let gateway = match HttpGateway::from_config(&config.llm) {
        Ok(gateway) => gateway,
        Err(error) => {
            return CommandResult::failure("start", "gateway_client", error.to_string(), 3);
        }
    };

    CommandResult::success(
        "start",
        format!(
            "preflight passed: provider={} model={} endpoint={} api_key={} listen={}:{}",
            config.llm.provider.as_str(),
            config.llm.model,
            gateway.endpoint(),
            credentials.redacted(),
            config.server.bind_address,
            config.server.port,
        ),
    )
}
