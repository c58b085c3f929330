use std::fs;
use std::path::Path;

use anyhow::Context;
use caserelay_core::config::{AppConfig, LoadOptions};
use caserelay_core::domain::case::CaseRequest;
use caserelay_core::prompt::PromptBuilder;

use crate::commands::CommandResult;

/// Renders the prompt for a case file without contacting the model.
pub fn run(path: &Path) -> CommandResult {
    let case = match read_case(path) {
        Ok(case) => case,
        Err(failure) => return failure,
    };

    let config = match AppConfig::load_unvalidated(LoadOptions::default())
        .and_then(|config| config.prompt.validate().map(|()| config))
    {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "render",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    match PromptBuilder::new(config.prompt).build(&case) {
        Ok(prompt) => CommandResult::plain(
            0,
            format!(
                "--- system ---\n{}\n\n--- user ---\n{}\n\n--- fingerprint ---\n{}",
                prompt.system(),
                prompt.user(),
                prompt.fingerprint()
            ),
        ),
        Err(error) => CommandResult::failure("render", "validation", error.to_string(), 3),
    }
}

fn read_case(path: &Path) -> Result<CaseRequest, CommandResult> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read case file `{}`", path.display()))
        .map_err(|error| CommandResult::failure("render", "input_read", format!("{error:#}"), 4))?;

    serde_json::from_str::<CaseRequest>(&raw)
        .with_context(|| format!("case file `{}` is not a valid case payload", path.display()))
        .map_err(|error| CommandResult::failure("render", "input_parse", format!("{error:#}"), 3))
}
