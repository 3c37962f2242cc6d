//! The retrofit engine.
//!
//! Leaf modules first:
//! - `source`, `file_scanner`: immutable file snapshots
//! - `classify`: candidate sites in markup
//! - `graph`: definition index and dependency resolution
//! - `context_window`: minimal source context per Complex candidate
//! - `keys`: translation key allocation
//! - `oracle`: the injected translation service and its call queue
//! - `patch`: transactional per-file rewrites
//! - `dictionary`, `report`: run artifacts
//! - `pipeline`: ties the phases together

pub mod cancel;
pub mod classify;
pub mod context_window;
pub mod dictionary;
pub mod file_scanner;
pub mod graph;
pub mod idents;
pub mod keys;
pub mod oracle;
pub mod parsers;
pub mod patch;
pub mod pipeline;
pub mod report;
pub mod source;

pub use cancel::CancelFlag;
pub use pipeline::{ConvertOutcome, Engine, ProjectScan, convert_project, scan_project, scan_report};
