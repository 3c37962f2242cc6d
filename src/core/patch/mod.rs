//! Transactional source edits.
//!
//! ```text
//! pending ──stage──> staged ──┬──> applied     (validated and written)
//!                             ├──> rejected    (validation failed)
//!                             └──> conflicted  (file changed, or overlap)
//! ```
//!
//! All patches of one file move together: a file is either left untouched
//! or receives every staged patch.
//!
//! - `apply`: per-file transaction and revert
//! - `hooks`: `useTranslation` import and hook insertion
//! - `validator`: post-rewrite syntax check

mod apply;
mod hooks;
mod validator;

use std::fmt;

use serde::Serialize;

use crate::core::classify::{CandidateId, SiteKind};
use crate::core::source::{FileId, Span};

pub use apply::{
    ApplyMode, FileApplyOutcome, apply_file_patches, backup_path, revert_patches, rewrite,
};
pub use hooks::{HOOK_IMPORT, HookOutline, HookPlan, outline_hooks, plan_hooks};
pub use validator::{SwcValidator, Validation, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStatus {
    Pending,
    Staged,
    Applied,
    Rejected,
    Conflicted,
}

impl PatchStatus {
    pub fn can_become(self, next: PatchStatus) -> bool {
        matches!(
            (self, next),
            (PatchStatus::Pending, PatchStatus::Staged)
                | (PatchStatus::Staged, PatchStatus::Applied)
                | (PatchStatus::Staged, PatchStatus::Rejected)
                | (PatchStatus::Staged, PatchStatus::Conflicted)
        )
    }

    pub fn is_final(self) -> bool {
        matches!(
            self,
            PatchStatus::Applied | PatchStatus::Rejected | PatchStatus::Conflicted
        )
    }
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchStatus::Pending => "pending",
            PatchStatus::Staged => "staged",
            PatchStatus::Applied => "applied",
            PatchStatus::Rejected => "rejected",
            PatchStatus::Conflicted => "conflicted",
        };
        write!(f, "{}", s)
    }
}

/// What a patch does to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchKind {
    /// Replaces a candidate with a key lookup.
    Lookup(CandidateId),
    /// Adds the hook import.
    Import,
    /// Adds a hook declaration to a component body.
    Hook,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub file: FileId,
    /// Span in the scanned content. Empty for insertions.
    pub span: Span,
    /// Text the span must still hold when the patch is applied.
    pub expected: String,
    pub replacement: String,
    pub kind: PatchKind,
    status: PatchStatus,
}

impl Patch {
    pub fn new(
        file: FileId,
        span: Span,
        expected: impl Into<String>,
        replacement: impl Into<String>,
        kind: PatchKind,
    ) -> Self {
        Self {
            file,
            span,
            expected: expected.into(),
            replacement: replacement.into(),
            kind,
            status: PatchStatus::Pending,
        }
    }

    pub fn insertion(file: FileId, offset: usize, text: impl Into<String>, kind: PatchKind) -> Self {
        Self::new(file, Span::new(offset, offset), "", text, kind)
    }

    pub fn status(&self) -> PatchStatus {
        self.status
    }

    pub fn candidate(&self) -> Option<CandidateId> {
        match self.kind {
            PatchKind::Lookup(id) => Some(id),
            PatchKind::Import | PatchKind::Hook => None,
        }
    }

    /// Move to `next`. Illegal transitions are ignored and reported.
    pub fn transition(&mut self, next: PatchStatus) -> bool {
        if self.status.can_become(next) {
            self.status = next;
            true
        } else {
            tracing::error!(from = %self.status, to = %next, span = %self.span, "illegal patch transition");
            false
        }
    }

    pub fn stage(&mut self) -> bool {
        self.transition(PatchStatus::Staged)
    }
}

/// Replacement text for a Simple candidate at `site`.
///
/// Markup text and quoted attributes become an expression container, a
/// literal inside an expression becomes a bare call.
pub fn lookup_replacement(site: SiteKind, lookup_fn: &str, key: &str) -> String {
    let call = format!("{}('{}')", lookup_fn, key.replace('\\', "\\\\").replace('\'', "\\'"));
    match site {
        SiteKind::JsxText | SiteKind::JsxAttr => format!("{{{}}}", call),
        SiteKind::ExprLiteral | SiteKind::Expression => call,
    }
}
