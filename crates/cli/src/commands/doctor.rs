use caserelay_core::config::{AppConfig, LoadOptions};
use caserelay_core::credentials::CredentialStore;
use caserelay_core::domain::case::CaseRequest;
use caserelay_core::prompt::PromptBuilder;
use caserelay_gateway::HttpGateway;
use serde::Serialize;

use crate::commands::{serialization_failure, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report)
            .unwrap_or_else(|error| serialization_failure("doctor", &error.to_string()));
        return CommandResult::plain(exit_code, output);
    }

    CommandResult::plain(exit_code, render_human(&report))
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_credentials(&config));
            checks.push(check_gateway(&config));
            checks.push(check_prompt_render(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["credential_store", "gateway_settings", "prompt_render"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_credentials(config: &AppConfig) -> DoctorCheck {
    match CredentialStore::from_config(&config.llm) {
        Ok(store) => DoctorCheck {
            name: "credential_store",
            status: CheckStatus::Pass,
            details: format!("api key loaded ({})", store.redacted()),
        },
        Err(error) => DoctorCheck {
            name: "credential_store",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_gateway(config: &AppConfig) -> DoctorCheck {
    match HttpGateway::from_config(&config.llm) {
        Ok(gateway) => {
            let policy = gateway.retry_policy();
            DoctorCheck {
                name: "gateway_settings",
                status: CheckStatus::Pass,
                details: format!(
                    "{} endpoint `{}`, timeout {}s, up to {} attempt(s)",
                    gateway.provider().as_str(),
                    gateway.endpoint(),
                    config.llm.timeout_secs,
                    policy.max_attempts()
                ),
            }
        }
        Err(error) => DoctorCheck {
            name: "gateway_settings",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_prompt_render(config: &AppConfig) -> DoctorCheck {
    let sample = CaseRequest {
        customer_id: Some("doctor-sample".to_string()),
        description: Some("Readiness check case".to_string()),
        ..CaseRequest::default()
    };

    match PromptBuilder::new(config.prompt.clone()).build(&sample) {
        Ok(prompt) => DoctorCheck {
            name: "prompt_render",
            status: CheckStatus::Pass,
            details: format!(
                "sample prompt rendered (fingerprint {})",
                prompt.fingerprint().chars().take(12).collect::<String>()
            ),
        },
        Err(error) => DoctorCheck {
            name: "prompt_render",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
