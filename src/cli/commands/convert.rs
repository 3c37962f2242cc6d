use std::sync::Arc;
use std::thread;

use anyhow::Result;

use super::shared::load_run_config;
use crate::cli::args::ConvertCommand;
use crate::cli::exit_status::ExitStatus;
use crate::cli::report::print_convert;
use crate::config::Config;
use crate::core::oracle::{HttpOracle, Oracle, SourceOracle};
use crate::core::{CancelFlag, Engine, convert_project, scan_project};

pub fn convert(cmd: ConvertCommand) -> Result<ExitStatus> {
    let mut config = load_run_config(&cmd.common)?;
    cmd.oracle.apply_to(&mut config);
    if cmd.backup {
        config.backup = true;
    }
    config.validate()?;

    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());
    let engine = Engine::new(build_oracle(&config)?).with_cancel(cancel);

    let scan = scan_project(&cmd.common.root, &config)?;
    let outcome = convert_project(&scan, &config, &engine, cmd.apply)?;
    print_convert(&outcome, cmd.common.verbose);

    if outcome.report.has_failures() {
        Ok(ExitStatus::Failure)
    } else {
        Ok(ExitStatus::Success)
    }
}

fn build_oracle(config: &Config) -> Result<Arc<dyn Oracle>> {
    match &config.oracle.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpOracle::new(endpoint.as_str())?)),
        None => {
            if !config.target_locales().is_empty() {
                tracing::warn!("no oracle endpoint configured; target locales get the source text");
            }
            Ok(Arc::new(SourceOracle))
        }
    }
}

/// Raise `cancel` on Ctrl-C. Files already being patched finish; the rest
/// are left as they were.
fn cancel_on_ctrl_c(cancel: CancelFlag) {
    thread::spawn(move || {
        let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        else {
            return;
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted, finishing files in progress...");
                cancel.cancel();
            }
        });
    });
}
