//! The run report: one record per candidate plus a summary, written to
//! `<root>/i18n-report.json`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::classify::{CandidateKind, SiteKind};
use crate::core::dictionary::DictionaryUpdate;
use crate::issues::{Diagnostic, DiagnosticKind};
use crate::utils::write_atomic;

pub const REPORT_FILE: &str = "i18n-report.json";

/// Final state of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    /// Rewritten on disk.
    Applied,
    /// Would be rewritten; the run was a dry run.
    Staged,
    /// The file's rewrite failed validation.
    Rejected,
    /// The file changed underneath the patches, or patches overlapped.
    Conflicted,
    /// No oracle answer.
    Unresolved,
    /// Text mixed with dynamic expressions; never patched.
    Ambiguous,
    /// Outside any component the lookup hook can reach.
    Uncovered,
    /// The oracle offered no replacement, or too little confidence.
    Declined,
    /// Found but not sent anywhere (scan only).
    Found,
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateStatus::Applied => "applied",
            CandidateStatus::Staged => "staged",
            CandidateStatus::Rejected => "rejected",
            CandidateStatus::Conflicted => "conflicted",
            CandidateStatus::Unresolved => "unresolved",
            CandidateStatus::Ambiguous => "ambiguous",
            CandidateStatus::Uncovered => "uncovered",
            CandidateStatus::Declined => "declined",
            CandidateStatus::Found => "found",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    pub file: String,
    pub candidate_id: String,
    pub line: usize,
    pub kind: CandidateKind,
    pub site: SiteKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub status: CandidateStatus,
    pub truncated: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub depth_limited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub dry_run: bool,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub candidates: usize,
    pub simple: usize,
    pub complex: usize,
    pub applied: usize,
    pub staged: usize,
    pub rejected: usize,
    pub conflicted: usize,
    pub unresolved: usize,
    pub ambiguous: usize,
    pub uncovered: usize,
    pub declined: usize,
    pub keys_created: usize,
    pub files_written: usize,
    pub oracle_calls: usize,
    pub oracle_successes: usize,
}

impl RunSummary {
    pub fn count(&mut self, status: CandidateStatus) {
        match status {
            CandidateStatus::Applied => self.applied += 1,
            CandidateStatus::Staged => self.staged += 1,
            CandidateStatus::Rejected => self.rejected += 1,
            CandidateStatus::Conflicted => self.conflicted += 1,
            CandidateStatus::Unresolved => self.unresolved += 1,
            CandidateStatus::Ambiguous => self.ambiguous += 1,
            CandidateStatus::Uncovered => self.uncovered += 1,
            CandidateStatus::Declined => self.declined += 1,
            CandidateStatus::Found => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub summary: RunSummary,
    pub candidates: Vec<CandidateReport>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dictionaries: Vec<DictionaryUpdate>,
}

impl RunReport {
    /// Work that was attempted and did not land, or a dictionary that
    /// could not be saved.
    pub fn has_failures(&self) -> bool {
        let s = &self.summary;
        s.rejected + s.conflicted + s.unresolved > 0
            || self
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::DictionaryWriteFailed)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run report")
    }

    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        let path = root.join(REPORT_FILE);
        write_atomic(&path, &format!("{}\n", self.to_json()?))?;
        Ok(path)
    }
}
