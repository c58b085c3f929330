pub mod config;
pub mod doctor;
pub mod render;
pub mod start;

use serde::Serialize;
use serde_json::json;

/// Output and process exit code of one CLI command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'a str,
    error_class: Option<&'a str>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::outcome(command, None, message.into(), 0)
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::outcome(command, Some(error_class), message.into(), exit_code)
    }

    /// Human-readable output that is not wrapped in a JSON outcome.
    pub fn plain(exit_code: u8, output: impl Into<String>) -> Self {
        Self { exit_code, output: output.into() }
    }

    fn outcome(command: &str, error_class: Option<&str>, message: String, exit_code: u8) -> Self {
        let payload = CommandOutcome {
            command,
            status: if error_class.is_some() { "error" } else { "ok" },
            error_class,
            message,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        serialization_failure(payload.command, &error.to_string())
    })
}

/// Outcome reported when a payload cannot be encoded. Built from a `Value`,
/// whose `Display` always yields valid JSON.
pub(crate) fn serialization_failure(command: &str, message: &str) -> String {
    json!({
        "command": command,
        "status": "error",
        "error_class": "serialization",
        "message": message,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{serialization_failure, CommandResult};

    #[test]
    fn failure_outcome_carries_error_class_and_exit_code() {
        let result = CommandResult::failure("start", "config_validation", "missing key", 2);
        let payload: Value = serde_json::from_str(&result.output).expect("json outcome");

        assert_eq!(result.exit_code, 2);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert_eq!(payload["message"], "missing key");
    }

    #[test]
    fn messages_with_quotes_and_control_characters_stay_valid_json() {
        let message = "line one\nline \"two\"\t\\end";
        let result = CommandResult::failure("render", "input_parse", message, 3);
        let payload: Value = serde_json::from_str(&result.output).expect("json outcome");
        assert_eq!(payload["message"], message);

        let fallback: Value =
            serde_json::from_str(&serialization_failure("doctor", message)).expect("json fallback");
        assert_eq!(fallback["command"], "doctor");
        assert_eq!(fallback["error_class"], "serialization");
        assert_eq!(fallback["message"], message);
    }

    #[test]
    fn success_outcome_has_null_error_class() {
        let result = CommandResult::success("start", "ready");
        let payload: Value = serde_json::from_str(&result.output).expect("json outcome");

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["status"], "ok");
        assert!(payload["error_class"].is_null());
    }
}
