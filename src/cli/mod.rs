//! Command-line layer: argument parsing, command dispatch and output.

use anyhow::Result;

pub mod args;
mod commands;
pub mod exit_status;
pub mod report;

pub use args::{Arguments, Command};
pub use exit_status::ExitStatus;

use commands::{convert::convert, init::init, scan::scan};

pub fn run_cli(args: Arguments) -> Result<ExitStatus> {
    let Some(args) = args.with_command_or_help() else {
        return Ok(ExitStatus::Success);
    };

    match args.command {
        Some(Command::Scan(cmd)) => scan(cmd),
        Some(Command::Convert(cmd)) => convert(cmd),
        Some(Command::Init) => init(),
        None => Ok(ExitStatus::Success),
    }
}
