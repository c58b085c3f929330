use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use caserelay_cli::commands::{config, doctor, render, start};
use serde_json::Value;
use tempfile::TempDir;

const TEST_KEY: &str = "sk-ant-test-0123456789";

#[test]
fn start_returns_success_with_api_key() {
    with_env(&[("CASERELAY_LLM_API_KEY", TEST_KEY)], || {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "expected successful start preflight");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().expect("message");
        assert!(message.contains("endpoint=https://api.anthropic.com/v1/messages"));
        assert!(!message.contains(TEST_KEY), "key must never be echoed");
    });
}

#[test]
fn start_returns_config_failure_without_api_key() {
    with_env(&[], || {
        let result = start::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().expect("message").contains("llm.api_key"));
    });
}

#[test]
fn start_accepts_vendor_key_fallback() {
    with_env(&[("ANTHROPIC_API_KEY", TEST_KEY)], || {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "vendor key should satisfy preflight");
    });
}

#[test]
fn doctor_json_reports_pass_when_ready() {
    with_env(&[("CASERELAY_LLM_API_KEY", TEST_KEY)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks.len(), 4);
        assert!(checks.iter().all(|check| check["status"] == "pass"));
    });
}

#[test]
fn doctor_json_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert!(checks[1..].iter().all(|check| check["status"] == "skipped"));
    });
}

#[test]
fn doctor_human_output_lists_checks() {
    with_env(&[("CASERELAY_LLM_API_KEY", TEST_KEY)], || {
        let result = doctor::run(false);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] prompt_render"));
    });
}

#[test]
fn config_output_redacts_key_and_attributes_env_source() {
    with_env(
        &[("CASERELAY_LLM_API_KEY", TEST_KEY), ("CASERELAY_LOG_LEVEL", "debug")],
        || {
            let output = config::run();

            assert!(!output.contains(TEST_KEY), "raw key leaked: {output}");
            assert!(output.contains("- llm.api_key = sk-a…6789 (source: env (CASERELAY_LLM_API_KEY))"));
            assert!(output.contains("- logging.level = debug (source: env (CASERELAY_LOG_LEVEL))"));
            assert!(output.contains("- server.port = 8000 (source: default)"));
            assert!(output.ends_with("validation: ok"));
        },
    );
}

#[test]
fn config_output_reports_missing_key_without_failing() {
    with_env(&[], || {
        let output = config::run();

        assert!(output.contains("- llm.api_key = <unset> (source: default)"));
        assert!(output.contains("validation: failed"));
    });
}

#[test]
fn render_prints_prompt_for_case_file() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("case.json");
        fs::write(
            &path,
            r#"{"customer_id":"C-1","description":"Billing dispute","account":{"contact_email":"jane@acme.example"}}"#,
        )
        .expect("write case");

        let result = render::run(&path);
        assert_eq!(result.exit_code, 0, "render failed: {}", result.output);
        assert!(result.output.contains("--- system ---"));
        assert!(result.output.contains("=== CASE ==="));
        assert!(result.output.contains("Customer ID: C-1"));
        assert!(result.output.contains("--- fingerprint ---"));
    });
}

#[test]
fn render_rejects_case_without_description() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("case.json");
        fs::write(&path, r#"{"customer_id":"C-1"}"#).expect("write case");

        let result = render::run(&path);
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "validation");
        assert!(payload["message"].as_str().expect("message").contains("description"));
    });
}

#[test]
fn render_rejects_unparseable_case_file() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("case.json");
        fs::write(&path, "{not json").expect("write case");

        let result = render::run(&path);
        assert_eq!(result.exit_code, 3);
        assert_eq!(parse_payload(&result.output)["error_class"], "input_parse");
    });
}

#[test]
fn render_reports_missing_case_file() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let result = render::run(&dir.path().join("absent.json"));

        assert_eq!(result.exit_code, 4);
        assert_eq!(parse_payload(&result.output)["error_class"], "input_read");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CASERELAY_LLM_PROVIDER",
        "CASERELAY_LLM_API_KEY",
        "CASERELAY_LLM_BASE_URL",
        "CASERELAY_LLM_MODEL",
        "CASERELAY_LLM_MAX_TOKENS",
        "CASERELAY_LLM_TIMEOUT_SECS",
        "CASERELAY_LLM_MAX_RETRIES",
        "CASERELAY_LLM_RETRY_BASE_DELAY_MS",
        "CASERELAY_LLM_RETRY_MAX_DELAY_MS",
        "CASERELAY_PROMPT_MAX_FIELD_CHARS",
        "CASERELAY_PROMPT_MAX_HISTORY_ENTRIES",
        "CASERELAY_SERVER_BIND_ADDRESS",
        "CASERELAY_SERVER_PORT",
        "CASERELAY_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "CASERELAY_SERVER_CORS_ALLOWED_ORIGINS",
        "CASERELAY_LOGGING_LEVEL",
        "CASERELAY_LOGGING_FORMAT",
        "CASERELAY_LOG_LEVEL",
        "CASERELAY_LOG_FORMAT",
        "ANTHROPIC_API_KEY",
        "OPENAI_API_KEY",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
