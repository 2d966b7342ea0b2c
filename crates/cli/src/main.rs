use std::process::ExitCode;

fn main() -> ExitCode {
    payflow_cli::run()
}
