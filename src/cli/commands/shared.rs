use anyhow::Result;

use crate::cli::args::CommonArgs;
use crate::config::{CONFIG_FILE_NAME, Config, load_config};
use crate::issues::RunError;

/// Load the config for `common.root` and apply command-line overrides.
///
/// Priority: CLI > config file > defaults. The root must exist before a
/// config is searched for.
pub fn load_run_config(common: &CommonArgs) -> Result<Config> {
    if !common.root.is_dir() {
        return Err(RunError::RootNotFound(common.root.clone()).into());
    }

    let config_result = load_config(&common.root)?;

    // In verbose mode, inform user if using default config
    if common.verbose && !config_result.from_file {
        eprintln!(
            "Note: No {} found, using default configuration",
            CONFIG_FILE_NAME
        );
    }

    let mut config = config_result.config;
    common.apply_to(&mut config);
    Ok(config)
}
