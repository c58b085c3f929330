use std::process::ExitCode;

fn main() -> ExitCode {
    caserelay_cli::run()
}
