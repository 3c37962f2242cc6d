use anyhow::Result;

use super::shared::load_run_config;
use crate::cli::args::ScanCommand;
use crate::cli::exit_status::ExitStatus;
use crate::cli::report::print_scan;
use crate::core::{scan_project, scan_report};

pub fn scan(cmd: ScanCommand) -> Result<ExitStatus> {
    let config = load_run_config(&cmd.common)?;
    config.validate()?;

    let scan = scan_project(&cmd.common.root, &config)?;
    let report = scan_report(&scan);
    print_scan(&scan, &report, cmd.common.verbose);

    Ok(ExitStatus::Success)
}
