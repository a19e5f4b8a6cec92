use std::process::ExitCode;

fn main() -> ExitCode {
    registrar_cli::run()
}
