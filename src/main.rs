use std::process::ExitCode;

use clap::Parser;
use lingofit::cli::{Arguments, ExitStatus};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Arguments::parse();
    init_tracing(args.verbose());

    match lingofit::cli::run_cli(args) {
        Ok(status) => status.into(),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitStatus::Error.into()
        }
    }
}

/// Log to stderr. `LINGOFIT_LOG` takes an `EnvFilter` directive; without it
/// only warnings are shown, or debug output with `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "lingofit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("LINGOFIT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
