//! annas-mcp binary entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::{Level, debug, error};
use tracing_subscriber::EnvFilter;

use annas_mcp::cli::{Cli, execute};

/// Initialises the tracing subscriber on stderr.
///
/// Stdout carries command output and, in stdio mode, protocol messages.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    // Loaded before parsing so `.env` can supply the `PORT` default and
    // `RUST_LOG`. A missing file is normal; existing variables win.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => error!(error = %e, "Failed to load .env file"),
    }

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                #[allow(clippy::print_stdout)]
                {
                    println!("{output}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
