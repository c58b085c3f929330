use std::env;
use std::fs;
use std::path::Path;

use caserelay_core::config::{resolve_config_path, AppConfig, LoadOptions, LogFormat};
use caserelay_core::credentials::redact_key;
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: Vec<&'static str>,
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &[&'static str]) -> Self {
        Self { key, value: value.into(), env_keys: env_keys.to_vec() }
    }
}

/// Effective configuration with source attribution. Secrets are redacted.
pub fn run() -> String {
    let config = match AppConfig::load_unvalidated(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config load failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec![
        "effective config (source precedence: override > env > file > default):".to_string()
    ];
    for field in effective_fields(&config) {
        let source =
            field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, &source));
    }

    match config.validate() {
        Ok(()) => lines.push("validation: ok".to_string()),
        Err(error) => lines.push(format!("validation: failed ({error})")),
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let llm = &config.llm;
    let api_key = llm
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field::new("llm.provider", llm.provider.as_str(), &["CASERELAY_LLM_PROVIDER"]),
        Field::new(
            "llm.api_key",
            api_key,
            &["CASERELAY_LLM_API_KEY", llm.provider.fallback_key_env()],
        ),
        Field::new("llm.base_url", llm.effective_base_url(), &["CASERELAY_LLM_BASE_URL"]),
        Field::new("llm.model", llm.model.as_str(), &["CASERELAY_LLM_MODEL"]),
        Field::new("llm.max_tokens", llm.max_tokens.to_string(), &["CASERELAY_LLM_MAX_TOKENS"]),
        Field::new(
            "llm.timeout_secs",
            llm.timeout_secs.to_string(),
            &["CASERELAY_LLM_TIMEOUT_SECS"],
        ),
        Field::new(
            "llm.max_retries",
            llm.max_retries.to_string(),
            &["CASERELAY_LLM_MAX_RETRIES"],
        ),
        Field::new(
            "llm.retry_base_delay_ms",
            llm.retry_base_delay_ms.to_string(),
            &["CASERELAY_LLM_RETRY_BASE_DELAY_MS"],
        ),
        Field::new(
            "llm.retry_max_delay_ms",
            llm.retry_max_delay_ms.to_string(),
            &["CASERELAY_LLM_RETRY_MAX_DELAY_MS"],
        ),
        Field::new(
            "prompt.max_field_chars",
            config.prompt.max_field_chars.to_string(),
            &["CASERELAY_PROMPT_MAX_FIELD_CHARS"],
        ),
        Field::new(
            "prompt.max_history_entries",
            config.prompt.max_history_entries.to_string(),
            &["CASERELAY_PROMPT_MAX_HISTORY_ENTRIES"],
        ),
        Field::new(
            "server.bind_address",
            config.server.bind_address.as_str(),
            &["CASERELAY_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["CASERELAY_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CASERELAY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "server.cors_allowed_origins",
            config.server.cors_allowed_origins.join(","),
            &["CASERELAY_SERVER_CORS_ALLOWED_ORIGINS"],
        ),
        Field::new(
            "logging.level",
            config.logging.level.as_str(),
            &["CASERELAY_LOGGING_LEVEL", "CASERELAY_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            log_format_name(config.logging.format),
            &["CASERELAY_LOGGING_FORMAT", "CASERELAY_LOG_FORMAT"],
        ),
    ]
}

fn log_format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            return match config_file_path {
                Some(path) => format!("file ({})", path.display()),
                None => "file".to_string(),
            };
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}
