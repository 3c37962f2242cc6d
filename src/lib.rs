//! Lingofit - retrofit i18n into JSX/TSX projects
//!
//! Lingofit finds user-facing text in component markup, works out how much
//! surrounding code each dynamic string depends on, and rewrites the source
//! with `react-i18next` lookups plus per-locale dictionaries. Files it cannot
//! verify are never written.
//!
//! ## Module Structure
//!
//! - `cli`: Command-line interface layer (argument parsing, commands, output)
//! - `config`: Configuration file loading and parsing
//! - `core`: The retrofit engine (scan, classify, resolve, patch)
//! - `issues`: Diagnostic and fatal error types
//! - `utils`: Shared utility functions

pub mod cli;
pub mod config;
pub mod core;
pub mod issues;
pub mod utils;
