use std::process::ExitCode;

fn main() -> ExitCode {
    claimscope_cli::run()
}
