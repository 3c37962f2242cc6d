//! CLI argument definitions using clap.
//!
//! ## Commands
//!
//! - `scan`: Find candidates and build context windows, without writing
//! - `convert`: Rewrite candidates into key lookups (dry-run unless `--apply`)
//! - `init`: Initialize a lingofit configuration file

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Arguments {
    /// Check if a command was provided, otherwise print help and return None.
    pub fn with_command_or_help(self) -> Option<Self> {
        if self.command.is_none() {
            Self::command().print_help().ok();
            None
        } else {
            Some(self)
        }
    }

    /// Get the verbose flag from the command's common args.
    pub fn verbose(&self) -> bool {
        match &self.command {
            Some(Command::Scan(cmd)) => cmd.common.verbose,
            Some(Command::Convert(cmd)) => cmd.common.verbose,
            Some(Command::Init) | None => false,
        }
    }
}

/// Common arguments shared by `scan` and `convert`.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Project root to scan
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Locale to generate; repeat for several (overrides config file)
    #[arg(long = "locale", value_name = "LOCALE")]
    pub locales: Vec<String>,

    /// Locale the source text is written in (overrides config file)
    #[arg(long)]
    pub source_locale: Option<String>,

    /// Line budget of a context window (overrides config file)
    #[arg(long)]
    pub max_context_lines: Option<usize>,

    /// Depth bound of the dependency walk (overrides config file)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        if !self.locales.is_empty() {
            config.locales = self.locales.clone();
        }
        if let Some(locale) = &self.source_locale {
            config.source_locale = locale.clone();
        }
        if let Some(lines) = self.max_context_lines {
            config.max_context_lines = lines;
        }
        if let Some(depth) = self.max_depth {
            config.max_dependency_depth = depth;
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct OracleArgs {
    /// Translation service endpoint; without one, source text is used
    #[arg(long, env = "LINGOFIT_ORACLE_ENDPOINT")]
    pub oracle_endpoint: Option<String>,

    /// Maximum concurrent oracle calls (overrides config file)
    #[arg(long)]
    pub oracle_concurrency: Option<usize>,
}

impl OracleArgs {
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(endpoint) = &self.oracle_endpoint {
            config.oracle.endpoint = Some(endpoint.clone());
        }
        if let Some(concurrency) = self.oracle_concurrency {
            config.oracle.concurrency = concurrency;
        }
    }
}

#[derive(Debug, Args)]
pub struct ScanCommand {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct ConvertCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub oracle: OracleArgs,

    /// Actually rewrite files and write dictionaries (default is dry-run)
    #[arg(long)]
    pub apply: bool,

    /// Copy each rewritten file to `<file>.backup` first (overrides config file)
    #[arg(long)]
    pub backup: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find translatable text and show what each candidate depends on
    Scan(ScanCommand),
    /// Replace hardcoded text with translation lookups
    Convert(ConvertCommand),
    /// Initialize a new .lingofitrc.json configuration file
    Init,
}
