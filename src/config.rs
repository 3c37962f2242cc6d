use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Ok, Result, bail};
use glob::Pattern;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = ".lingofitrc.json";

pub const TEST_FILE_PATTERNS: &[&str] = &[
    "**/*.test.tsx",
    "**/*.test.ts",
    "**/*.test.jsx",
    "**/*.test.js",
    "**/*.spec.tsx",
    "**/*.spec.ts",
    "**/*.spec.jsx",
    "**/*.spec.js",
    "**/__tests__/**",
];

/// Next.js framework entry files that never carry user-facing text of their own.
pub const FRAMEWORK_FILES: &[&str] = &["_app", "_document", "_error"];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_ignores")]
    pub ignores: Vec<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default = "default_translatable_attributes")]
    pub translatable_attributes: Vec<String>,
    #[serde(default)]
    pub ignore_texts: Vec<String>,
    #[serde(default = "default_lookup_functions")]
    pub lookup_functions: Vec<String>,
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,
    #[serde(default = "default_source_locale")]
    pub source_locale: String,
    #[serde(default = "default_locales_dir")]
    pub locales_dir: String,
    #[serde(default = "default_ignore_test_files")]
    pub ignore_test_files: bool,
    #[serde(default = "default_max_context_lines")]
    pub max_context_lines: usize,
    #[serde(default = "default_max_dependency_depth")]
    pub max_dependency_depth: usize,
    #[serde(default)]
    pub insert_hooks: InsertHooks,
    #[serde(default)]
    pub min_confidence: f32,
    /// Copy each source file to `<file>.backup` before rewriting it.
    #[serde(default)]
    pub backup: bool,
    #[serde(default)]
    pub oracle: OracleConfig,
}

/// Whether converted components get the `useTranslation` import and hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertHooks {
    #[default]
    Auto,
    Never,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleConfig {
    /// HTTP endpoint of the translation oracle. Without one, an offline
    /// oracle copies source text into every locale.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_oracle_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_oracle_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_oracle_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_oracle_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_ignores() -> Vec<String> {
    ["**/node_modules/**", "**/.next/**", "**/build/**", "**/dist/**"]
        .map(String::from)
        .to_vec()
}

fn default_translatable_attributes() -> Vec<String> {
    [
        "placeholder",
        "title",
        "alt",
        "label",
        "aria-label",
        "aria-description",
        "aria-placeholder",
        "aria-roledescription",
        "aria-valuetext",
    ]
    .map(String::from)
    .to_vec()
}

fn default_lookup_functions() -> Vec<String> {
    vec!["t".to_string()]
}

fn default_locales() -> Vec<String> {
    vec!["en".to_string(), "es".to_string()]
}

fn default_source_locale() -> String {
    "en".to_string()
}

fn default_locales_dir() -> String {
    "public/locales".to_string()
}

fn default_ignore_test_files() -> bool {
    true
}

fn default_max_context_lines() -> usize {
    80
}

fn default_max_dependency_depth() -> usize {
    3
}

fn default_oracle_concurrency() -> usize {
    4
}

fn default_oracle_max_attempts() -> u32 {
    3
}

fn default_oracle_timeout_ms() -> u64 {
    30_000
}

fn default_oracle_min_interval_ms() -> u64 {
    100
}

fn default_oracle_backoff_ms() -> u64 {
    500
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            concurrency: default_oracle_concurrency(),
            max_attempts: default_oracle_max_attempts(),
            timeout_ms: default_oracle_timeout_ms(),
            min_interval_ms: default_oracle_min_interval_ms(),
            backoff_ms: default_oracle_backoff_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignores: default_ignores(),
            includes: Vec::new(),
            translatable_attributes: default_translatable_attributes(),
            ignore_texts: Vec::new(),
            lookup_functions: default_lookup_functions(),
            locales: default_locales(),
            source_locale: default_source_locale(),
            locales_dir: default_locales_dir(),
            ignore_test_files: default_ignore_test_files(),
            max_context_lines: default_max_context_lines(),
            max_dependency_depth: default_max_dependency_depth(),
            insert_hooks: InsertHooks::default(),
            min_confidence: 0.0,
            backup: false,
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    ///
    /// Returns an error if any glob pattern is invalid or a numeric limit is
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.ignores {
            Pattern::new(pattern)
                .with_context(|| format!("Invalid glob pattern in 'ignores': \"{}\"", pattern))?;
        }

        // Patterns without wildcards are literal directory paths, so Next.js
        // segments like [locale] are valid without escaping.
        for pattern in &self.includes {
            if pattern.contains('*') || pattern.contains('?') {
                Pattern::new(pattern).with_context(|| {
                    format!("Invalid glob pattern in 'includes': \"{}\"", pattern)
                })?;
            }
        }

        if self.locales.is_empty() {
            bail!("'locales' must list at least one locale");
        }
        if self.lookup_functions.is_empty() {
            bail!("'lookupFunctions' must name at least one function");
        }
        if self.max_context_lines == 0 {
            bail!("'maxContextLines' must be greater than 0");
        }
        if self.oracle.concurrency == 0 {
            bail!("'oracle.concurrency' must be greater than 0");
        }
        if self.oracle.max_attempts == 0 {
            bail!("'oracle.maxAttempts' must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            bail!("'minConfidence' must be between 0 and 1");
        }

        Ok(())
    }

    /// Locales that need oracle translations (everything but the source locale).
    pub fn target_locales(&self) -> Vec<String> {
        self.locales
            .iter()
            .filter(|locale| **locale != self.source_locale)
            .cloned()
            .collect()
    }

    /// The lookup function patches call and hooks bind.
    pub fn lookup_function(&self) -> &str {
        self.lookup_functions.first().map(String::as_str).unwrap_or("t")
    }

    /// Source locale first, then the remaining locales in configured order.
    pub fn all_locales(&self) -> Vec<String> {
        let mut locales = vec![self.source_locale.clone()];
        locales.extend(self.target_locales());
        locales
    }
}

pub fn default_config_json() -> Result<String> {
    let config = Config::default();
    serde_json::to_string_pretty(&config).context("Failed to generate default config.")
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if current.join(".git").exists() {
            return None;
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Result of loading configuration.
pub struct ConfigLoadResult {
    pub config: Config,
    /// True if config was loaded from a file, false if using defaults.
    pub from_file: bool,
}

pub fn load_config(start_dir: &Path) -> Result<ConfigLoadResult> {
    match find_config_file(start_dir) {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config.validate()?;
            Ok(ConfigLoadResult {
                config,
                from_file: true,
            })
        }
        None => Ok(ConfigLoadResult {
            config: Config::default(),
            from_file: false,
        }),
    }
}
