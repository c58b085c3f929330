pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "caserelay",
    about = "caserelay operator CLI",
    long_about = "Check caserelay startup readiness, inspect effective configuration, and preview the prompts sent to the language model.",
    after_help = "Examples:\n  caserelay doctor --json\n  caserelay config\n  caserelay render case.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credential readiness, gateway settings and prompt rendering")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Render the prompt the service would send for a case file, without calling the model")]
    Render {
        #[arg(help = "Path to a JSON case file")]
        path: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Render { path } => commands::render::run(&path),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
