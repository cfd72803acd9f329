//! compose2ansible - Docker Compose to Podman Ansible translator

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = compose2ansible::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::from(compose2ansible::cli::exit_code(&e))
    } else {
        ExitCode::SUCCESS
    }
}
