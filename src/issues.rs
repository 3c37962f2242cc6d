//! Diagnostic types produced during a run.
//!
//! Every non-fatal problem becomes an [`Issue`]. Each issue is self-contained
//! with all information needed by:
//! - the CLI reporter, to print it cargo-style
//! - the run report, to serialize it as a [`Diagnostic`]
//!
//! Fatal problems abort the run before any writes and are [`RunError`]s.

use std::path::PathBuf;

use enum_dispatch::enum_dispatch;
use serde::Serialize;
use thiserror::Error;

// ============================================================
// Severity and Kind
// ============================================================

/// Severity level of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Non-fatal diagnostic taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    ScanError,
    ClassificationAmbiguous,
    DependencyCycleDetected,
    ContextBudgetExceeded,
    OracleUnavailable,
    PatchConflict,
    ValidationFailed,
    DictionaryWriteFailed,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::ScanError => write!(f, "scan-error"),
            DiagnosticKind::ClassificationAmbiguous => write!(f, "classification-ambiguous"),
            DiagnosticKind::DependencyCycleDetected => write!(f, "dependency-cycle-detected"),
            DiagnosticKind::ContextBudgetExceeded => write!(f, "context-budget-exceeded"),
            DiagnosticKind::OracleUnavailable => write!(f, "oracle-unavailable"),
            DiagnosticKind::PatchConflict => write!(f, "patch-conflict"),
            DiagnosticKind::ValidationFailed => write!(f, "validation-failed"),
            DiagnosticKind::DictionaryWriteFailed => write!(f, "dictionary-write-failed"),
        }
    }
}

/// Errors that abort a run before anything is written.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("scan root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("oracle unreachable: all {attempts} call(s) failed")]
    OracleUnreachable { attempts: usize },
    #[error("run cancelled before any file was written")]
    Cancelled,
}

// ============================================================
// Locations
// ============================================================

/// A position in a scanned source file. Line and column are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file_path: String,
    pub line: usize,
    pub col: usize,
    /// The source line, shown under the location in the CLI output.
    pub source_line: Option<String>,
}

impl SourceLocation {
    pub fn new(file_path: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            file_path: file_path.into(),
            line,
            col,
            source_line: None,
        }
    }

    pub fn with_source_line(mut self, source_line: impl Into<String>) -> Self {
        self.source_line = Some(source_line.into());
        self
    }
}

// ============================================================
// Issue Types
// ============================================================

/// A file that could not be read or parsed. It is skipped; the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanErrorIssue {
    pub file_path: String,
    pub error: String,
}

/// A shape whose classification was not clear-cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousIssue {
    pub location: SourceLocation,
    pub snippet: String,
    pub reason: AmbiguityReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityReason {
    /// An outer expression was dropped in favour of shapes nested inside it.
    InnerShapesWin,
    /// Literal text and a dynamic expression share one element.
    MixedChildren,
}

/// The dependency walk closed a cycle; the closing edge was not followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCycleIssue {
    pub location: SourceLocation,
    /// Names along the cycle, starting and ending with the same name.
    pub cycle: Vec<String>,
}

/// The context window did not fit the line budget and was truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBudgetIssue {
    pub location: SourceLocation,
    pub needed_lines: usize,
    pub budget: usize,
}

/// The oracle gave no usable answer for a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleUnavailableIssue {
    pub location: SourceLocation,
    pub reason: String,
}

/// A file changed underneath its staged patches, or two patches overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConflictIssue {
    pub location: SourceLocation,
    pub reason: String,
}

/// A rewritten file failed validation and was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailedIssue {
    pub file_path: String,
    pub error: String,
    pub rejected_patches: usize,
}

/// A locale dictionary could not be saved after sources were rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryWriteIssue {
    pub file_path: String,
    pub locale: String,
    pub error: String,
}

// ============================================================
// Issue Enum + Report Trait
// ============================================================

#[enum_dispatch(Report)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    ScanError(ScanErrorIssue),
    Ambiguous(AmbiguousIssue),
    DependencyCycle(DependencyCycleIssue),
    ContextBudget(ContextBudgetIssue),
    OracleUnavailable(OracleUnavailableIssue),
    PatchConflict(PatchConflictIssue),
    ValidationFailed(ValidationFailedIssue),
    DictionaryWrite(DictionaryWriteIssue),
}

/// Where an issue points.
#[derive(Debug, Clone, Copy)]
pub enum ReportLocation<'a> {
    Source(&'a SourceLocation),
    File { path: &'a str },
}

impl ReportLocation<'_> {
    pub fn file_path(&self) -> &str {
        match self {
            ReportLocation::Source(loc) => &loc.file_path,
            ReportLocation::File { path } => path,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            ReportLocation::Source(loc) => loc.line,
            ReportLocation::File { .. } => 0,
        }
    }

    pub fn col(&self) -> usize {
        match self {
            ReportLocation::Source(loc) => loc.col,
            ReportLocation::File { .. } => 0,
        }
    }
}

/// Uniform view over all issue types for the reporter. Uses `enum_dispatch`
/// so `Issue` forwards to the concrete type without boxing.
#[enum_dispatch]
pub trait Report {
    fn location(&self) -> ReportLocation<'_>;

    fn message(&self) -> String;

    fn kind(&self) -> DiagnosticKind;

    fn report_severity(&self) -> Severity {
        match self.kind() {
            DiagnosticKind::PatchConflict
            | DiagnosticKind::ValidationFailed
            | DiagnosticKind::DictionaryWriteFailed => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// Optional extra note shown below the location.
    fn details(&self) -> Option<String> {
        None
    }
}

impl Report for ScanErrorIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::File {
            path: &self.file_path,
        }
    }

    fn message(&self) -> String {
        self.error.clone()
    }

    fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::ScanError
    }
}

impl Report for AmbiguousIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        self.snippet.clone()
    }

    fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::ClassificationAmbiguous
    }

    fn details(&self) -> Option<String> {
        Some(match self.reason {
            AmbiguityReason::InnerShapesWin => {
                "nested shapes were extracted instead of the enclosing expression".to_string()
            }
            AmbiguityReason::MixedChildren => {
                "text and dynamic expressions are mixed in one element; left for manual review"
                    .to_string()
            }
        })
    }
}

impl Report for DependencyCycleIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        self.cycle.join(" -> ")
    }

    fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::DependencyCycleDetected
    }
}

impl Report for ContextBudgetIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        format!(
            "context needs {} lines, budget is {}",
            self.needed_lines, self.budget
        )
    }

    fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::ContextBudgetExceeded
    }

    fn details(&self) -> Option<String> {
        Some("window truncated; oracle confidence halved".to_string())
    }
}

impl Report for OracleUnavailableIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        self.reason.clone()
    }

    fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::OracleUnavailable
    }
}

impl Report for PatchConflictIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        self.reason.clone()
    }

    fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::PatchConflict
    }

    fn details(&self) -> Option<String> {
        Some("no patch was written to this file".to_string())
    }
}

impl Report for ValidationFailedIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::File {
            path: &self.file_path,
        }
    }

    fn message(&self) -> String {
        self.error.clone()
    }

    fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::ValidationFailed
    }

    fn details(&self) -> Option<String> {
        Some(format!(
            "{} patch(es) rejected, file left untouched",
            self.rejected_patches
        ))
    }
}

impl Report for DictionaryWriteIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::File {
            path: &self.file_path,
        }
    }

    fn message(&self) -> String {
        self.error.clone()
    }

    fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::DictionaryWriteFailed
    }

    fn details(&self) -> Option<String> {
        Some(format!(
            "`{}` keys used by rewritten files are missing from this dictionary",
            self.locale
        ))
    }
}

// ============================================================
// Serializable form
// ============================================================

/// Flat, serializable form of an [`Issue`] for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl From<&Issue> for Diagnostic {
    fn from(issue: &Issue) -> Self {
        let location = issue.location();
        Self {
            kind: issue.kind(),
            file: location.file_path().to_string(),
            line: match location {
                ReportLocation::Source(loc) => Some(loc.line),
                ReportLocation::File { .. } => None,
            },
            message: issue.message(),
        }
    }
}

// ============================================================
// Ordering for Issue (for sorting in reports)
// ============================================================

impl Ord for Issue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let (a, b) = (self.location(), other.location());
        a.file_path()
            .cmp(b.file_path())
            .then_with(|| a.line().cmp(&b.line()))
            .then_with(|| a.col().cmp(&b.col()))
            .then_with(|| self.kind().cmp(&other.kind()))
            .then_with(|| self.message().cmp(&other.message()))
    }
}

impl PartialOrd for Issue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================
// Tests
// ============================================================
