use std::process::ExitCode;

fn main() -> ExitCode {
    sytest::cli::run()
}
