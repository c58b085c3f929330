//! Process-wide holder for the upstream LLM API key.
//!
//! Built once during bootstrap from the validated [`LlmConfig`] and shared by
//! `Arc` afterwards. Nothing in the request path reads the environment.

use secrecy::{ExposeSecret, SecretString};

use crate::config::{ConfigError, LlmConfig};

#[derive(Clone, Debug)]
pub struct CredentialStore {
    api_key: SecretString,
}

impl CredentialStore {
    pub fn new(api_key: SecretString) -> Result<Self, ConfigError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::MissingCredential("llm api key is empty".to_string()));
        }
        Ok(Self { api_key })
    }

    pub fn from_config(llm: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = llm.api_key.clone().ok_or_else(|| {
            ConfigError::MissingCredential(format!(
                "llm api key is not configured (set CASERELAY_LLM_API_KEY or {})",
                llm.provider.fallback_key_env()
            ))
        })?;
        Self::new(api_key)
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Masked rendering for operator output, e.g. `sk-a…c123`.
    pub fn redacted(&self) -> String {
        redact_key(self.api_key.expose_secret())
    }
}

pub fn redact_key(value: &str) -> String {
    let chars = value.chars().collect::<Vec<_>>();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head = chars[..4].iter().collect::<String>();
    let tail = chars[chars.len() - 4..].iter().collect::<String>();
    format!("{head}…{tail}")
}
