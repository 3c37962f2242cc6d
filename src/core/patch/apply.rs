use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::{Patch, PatchStatus, Validator};
use crate::core::source::{FileId, SourceFile};
use crate::issues::{Issue, PatchConflictIssue, ValidationFailedIssue};
use crate::utils::write_atomic;

/// What happened to one file's patch set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileApplyOutcome {
    pub file: FileId,
    /// Status shared by every patch of the file.
    pub status: PatchStatus,
    pub issue: Option<Issue>,
    /// The rewritten content, when it passed validation.
    pub rewritten: Option<String>,
    pub written: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Validate against the scanned snapshot; nothing is written.
    DryRun,
    Write,
    /// Write, after copying the current content to `<file>.backup`.
    WriteWithBackup,
}

impl ApplyMode {
    pub fn new(apply: bool, backup: bool) -> Self {
        match (apply, backup) {
            (false, _) => ApplyMode::DryRun,
            (true, false) => ApplyMode::Write,
            (true, true) => ApplyMode::WriteWithBackup,
        }
    }

    pub fn writes(self) -> bool {
        self != ApplyMode::DryRun
    }
}

/// Where the pre-rewrite copy of `path` goes.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// Apply every staged patch of one file as a single transaction.
///
/// When writing, the current disk content is checked against each patch's
/// expected text, the rewrite is validated and checked to revert cleanly,
/// and the file is replaced atomically; patches end `applied`. A dry run
/// uses the scanned snapshot and successful patches stay `staged`.
pub fn apply_file_patches(
    file: &SourceFile,
    patches: &mut [Patch],
    validator: &dyn Validator,
    mode: ApplyMode,
) -> FileApplyOutcome {
    debug_assert!(patches.iter().all(|p| p.file == file.id));
    let write = mode.writes();

    let current = if write {
        match fs::read_to_string(&file.path) {
            Ok(content) => content,
            Err(e) => {
                return conflict(file, patches, 0, format!("file could not be re-read: {}", e));
            }
        }
    } else {
        file.content.clone()
    };

    if let Some((offset, reason)) = find_conflict(&current, patches) {
        return conflict(file, patches, offset, reason);
    }

    let staged: Vec<&Patch> = patches.iter().collect();
    let rewritten = rewrite(&current, &staged);
    match revert_patches(&rewritten, patches) {
        Ok(reverted) if reverted == current => {}
        Ok(_) => return conflict(file, patches, 0, "rewrite does not revert to the original".to_string()),
        Err(e) => return conflict(file, patches, 0, format!("{:#}", e)),
    }

    let validation = validator.validate(&file.path, &rewritten);
    if !validation.valid {
        let error = validation.diagnostics.join("; ");
        tracing::warn!(file = %file.display_path(), %error, "rewrite failed validation");
        for patch in patches.iter_mut() {
            patch.transition(PatchStatus::Rejected);
        }
        return FileApplyOutcome {
            file: file.id,
            status: PatchStatus::Rejected,
            issue: Some(Issue::ValidationFailed(ValidationFailedIssue {
                file_path: file.display_path(),
                error,
                rejected_patches: patches.len(),
            })),
            rewritten: None,
            written: false,
        };
    }

    if !write {
        return FileApplyOutcome {
            file: file.id,
            status: PatchStatus::Staged,
            issue: None,
            rewritten: Some(rewritten),
            written: false,
        };
    }

    if mode == ApplyMode::WriteWithBackup
        && let Err(e) = write_backup(&file.path, &current)
    {
        return conflict(file, patches, 0, format!("{:#}", e));
    }
    if let Err(e) = write_atomic(&file.path, &rewritten) {
        return conflict(file, patches, 0, format!("{:#}", e));
    }

    for patch in patches.iter_mut() {
        patch.transition(PatchStatus::Applied);
    }
    tracing::debug!(file = %file.display_path(), patches = patches.len(), "file rewritten");
    FileApplyOutcome {
        file: file.id,
        status: PatchStatus::Applied,
        issue: None,
        rewritten: Some(rewritten),
        written: true,
    }
}

fn write_backup(path: &Path, content: &str) -> Result<()> {
    let backup = backup_path(path);
    write_atomic(&backup, content)
        .with_context(|| format!("Failed to back up {}", path.display()))?;
    tracing::debug!(backup = %backup.display(), "backup written");
    Ok(())
}

fn conflict(file: &SourceFile, patches: &mut [Patch], offset: usize, reason: String) -> FileApplyOutcome {
    tracing::warn!(file = %file.display_path(), %reason, "patch conflict");
    for patch in patches.iter_mut() {
        patch.transition(PatchStatus::Conflicted);
    }
    let offset = offset.min(file.byte_len());
    FileApplyOutcome {
        file: file.id,
        status: PatchStatus::Conflicted,
        issue: Some(Issue::PatchConflict(PatchConflictIssue {
            location: file.location(offset),
            reason,
        })),
        rewritten: None,
        written: false,
    }
}

/// First reason the patch set cannot be applied to `content`, with the
/// offset it concerns.
fn find_conflict(content: &str, patches: &[Patch]) -> Option<(usize, String)> {
    if let Some(patch) = patches.iter().find(|p| p.status() != PatchStatus::Staged) {
        return Some((patch.span.lo, format!("patch at {} is {}, not staged", patch.span, patch.status())));
    }

    for patch in patches {
        let span = patch.span;
        let in_bounds = span.hi <= content.len()
            && content.is_char_boundary(span.lo)
            && content.is_char_boundary(span.hi);
        if !in_bounds || content[span.lo..span.hi] != patch.expected {
            return Some((
                span.lo,
                format!("content at {} no longer matches {:?}", span, patch.expected),
            ));
        }
    }

    let mut ordered: Vec<&Patch> = patches.iter().collect();
    ordered.sort_by_key(|p| (p.span.lo, p.span.hi));
    for pair in ordered.windows(2) {
        if pair[0].span.overlaps(pair[1].span) {
            return Some((
                pair[1].span.lo,
                format!("patches at {} and {} overlap", pair[0].span, pair[1].span),
            ));
        }
    }
    None
}

/// Apply non-overlapping patches to `content` in reverse start order.
pub fn rewrite(content: &str, patches: &[&Patch]) -> String {
    let mut ordered = patches.to_vec();
    ordered.sort_by_key(|p| std::cmp::Reverse((p.span.lo, p.span.hi)));

    let mut out = content.to_string();
    for patch in ordered {
        out.replace_range(patch.span.lo..patch.span.hi, &patch.replacement);
    }
    out
}

/// Undo `patches` on content they were applied to, restoring the original
/// bytes.
pub fn revert_patches(content: &str, patches: &[Patch]) -> Result<String> {
    let mut ordered: Vec<&Patch> = patches.iter().collect();
    ordered.sort_by_key(|p| (p.span.lo, p.span.hi));

    // Where each replacement sits in the rewritten content.
    let mut shifted = Vec::with_capacity(ordered.len());
    let mut delta: isize = 0;
    for patch in ordered {
        let lo = patch.span.lo.checked_add_signed(delta);
        let Some(lo) = lo else {
            bail!("patch at {} does not fit the rewritten content", patch.span);
        };
        let hi = lo + patch.replacement.len();
        if content.get(lo..hi) != Some(patch.replacement.as_str()) {
            bail!("replacement for {} is not where it was applied", patch.span);
        }
        shifted.push((lo, hi, patch));
        delta += patch.replacement.len() as isize - patch.span.len() as isize;
    }

    let mut out = content.to_string();
    for (lo, hi, patch) in shifted.into_iter().rev() {
        out.replace_range(lo..hi, &patch.expected);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::core::classify::CandidateId;
    use crate::core::patch::{PatchKind, SwcValidator, Validation};
    use crate::core::source::Span;

    const APP: &str = "export const App = () => (\n  <div title=\"Greeting\">\n    <p>Hello</p>\n  </div>\n);\n";

    fn lookup(file: FileId, content: &str, text: &str, replacement: &str, index: usize) -> Patch {
        let lo = content.find(text).unwrap();
        let mut patch = Patch::new(
            file,
            Span::new(lo, lo + text.len()),
            text,
            replacement,
            PatchKind::Lookup(CandidateId { file, index }),
        );
        patch.stage();
        patch
    }

    fn app_patches(file: &SourceFile) -> Vec<Patch> {
        vec![
            lookup(file.id, &file.content, "\"Greeting\"", "{t('greeting')}", 0),
            lookup(file.id, &file.content, "Hello", "{t('hello')}", 1),
        ]
    }

    fn on_disk(dir: &TempDir, name: &str, content: &str) -> SourceFile {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        SourceFile::new(FileId(0), path, content.to_string())
    }

    struct RejectAll;

    impl Validator for RejectAll {
        fn validate(&self, _path: &Path, _content: &str) -> Validation {
            Validation::invalid("unexpected token")
        }
    }

    #[test]
    fn test_rewrite_applies_in_reverse_order() {
        let file = SourceFile::new(FileId(0), "App.tsx", APP.to_string());
        let patches = app_patches(&file);
        let refs: Vec<&Patch> = patches.iter().collect();
        assert_eq!(
            rewrite(APP, &refs),
            "export const App = () => (\n  <div title={t('greeting')}>\n    <p>{t('hello')}</p>\n  </div>\n);\n"
        );
    }

    #[test]
    fn test_applied_file_is_rewritten_atomically() {
        let dir = TempDir::new().unwrap();
        let file = on_disk(&dir, "App.tsx", APP);
        let mut patches = app_patches(&file);

        let outcome = apply_file_patches(&file, &mut patches, &SwcValidator, ApplyMode::Write);

        assert_eq!(outcome.status, PatchStatus::Applied);
        assert!(outcome.written);
        assert!(patches.iter().all(|p| p.status() == PatchStatus::Applied));
        let written = fs::read_to_string(&file.path).unwrap();
        assert!(written.contains("<p>{t('hello')}</p>"));
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_backup_keeps_the_original() {
        let dir = TempDir::new().unwrap();
        let file = on_disk(&dir, "App.tsx", APP);
        let mut patches = app_patches(&file);

        let outcome =
            apply_file_patches(&file, &mut patches, &SwcValidator, ApplyMode::WriteWithBackup);

        assert_eq!(outcome.status, PatchStatus::Applied);
        assert_eq!(backup_path(&file.path), dir.path().join("App.tsx.backup"));
        assert_eq!(fs::read_to_string(backup_path(&file.path)).unwrap(), APP);
        assert!(fs::read_to_string(&file.path).unwrap().contains("{t('hello')}"));
    }

    #[test]
    fn test_apply_mode_from_flags() {
        assert_eq!(ApplyMode::new(false, true), ApplyMode::DryRun);
        assert_eq!(ApplyMode::new(true, false), ApplyMode::Write);
        assert_eq!(ApplyMode::new(true, true), ApplyMode::WriteWithBackup);
        assert!(!ApplyMode::DryRun.writes());
    }

    #[test]
    fn test_dry_run_leaves_patches_staged_and_file_alone() {
        let dir = TempDir::new().unwrap();
        let file = on_disk(&dir, "App.tsx", APP);
        let mut patches = app_patches(&file);

        let outcome = apply_file_patches(&file, &mut patches, &SwcValidator, ApplyMode::DryRun);

        assert_eq!(outcome.status, PatchStatus::Staged);
        assert!(!outcome.written);
        assert!(outcome.rewritten.unwrap().contains("{t('greeting')}"));
        assert_eq!(fs::read_to_string(&file.path).unwrap(), APP);
    }

    #[test]
    fn test_validation_failure_rejects_every_patch() {
        let dir = TempDir::new().unwrap();
        let file = on_disk(&dir, "App.tsx", APP);
        let mut patches = app_patches(&file);

        let outcome = apply_file_patches(&file, &mut patches, &RejectAll, ApplyMode::Write);

        assert_eq!(outcome.status, PatchStatus::Rejected);
        assert!(patches.iter().all(|p| p.status() == PatchStatus::Rejected));
        assert_eq!(fs::read_to_string(&file.path).unwrap(), APP);
        match outcome.issue {
            Some(Issue::ValidationFailed(issue)) => assert_eq!(issue.rejected_patches, 2),
            other => panic!("expected a validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_broken_replacement_is_caught_by_swc() {
        let dir = TempDir::new().unwrap();
        let file = on_disk(&dir, "App.tsx", APP);
        let mut patches = vec![lookup(file.id, APP, "Hello", "{t('hello'}", 0)];

        let outcome = apply_file_patches(&file, &mut patches, &SwcValidator, ApplyMode::Write);

        assert_eq!(outcome.status, PatchStatus::Rejected);
        assert_eq!(fs::read(&file.path).unwrap(), APP.as_bytes());
    }

    #[test]
    fn test_changed_file_conflicts_and_is_not_written() {
        let dir = TempDir::new().unwrap();
        let file = on_disk(&dir, "App.tsx", APP);
        let mut patches = app_patches(&file);
        let edited = APP.replace("Hello", "Howdy");
        fs::write(&file.path, &edited).unwrap();

        let outcome = apply_file_patches(&file, &mut patches, &SwcValidator, ApplyMode::Write);

        assert_eq!(outcome.status, PatchStatus::Conflicted);
        assert!(patches.iter().all(|p| p.status() == PatchStatus::Conflicted));
        assert!(matches!(outcome.issue, Some(Issue::PatchConflict(_))));
        assert_eq!(fs::read_to_string(&file.path).unwrap(), edited);
    }

    #[test]
    fn test_overlapping_patches_conflict() {
        let file = SourceFile::new(FileId(0), "App.tsx", APP.to_string());
        let mut patches = vec![
            lookup(file.id, APP, "<p>Hello</p>", "{x}", 0),
            lookup(file.id, APP, "Hello", "{t('hello')}", 1),
        ];

        let outcome = apply_file_patches(&file, &mut patches, &SwcValidator, ApplyMode::DryRun);

        assert_eq!(outcome.status, PatchStatus::Conflicted);
        assert!(outcome.rewritten.is_none());
    }

    #[test]
    fn test_revert_restores_original_bytes() {
        let file = SourceFile::new(FileId(0), "App.tsx", APP.to_string());
        let mut patches = app_patches(&file);
        let mut import = Patch::insertion(
            file.id,
            0,
            "import { useTranslation } from 'react-i18next';\n",
            PatchKind::Import,
        );
        import.stage();
        patches.push(import);

        let refs: Vec<&Patch> = patches.iter().collect();
        let rewritten = rewrite(APP, &refs);
        assert_ne!(rewritten, APP);
        assert_eq!(revert_patches(&rewritten, &patches).unwrap(), APP);
    }

    #[test]
    fn test_revert_refuses_foreign_content() {
        let file = SourceFile::new(FileId(0), "App.tsx", APP.to_string());
        let patches = app_patches(&file);
        assert!(revert_patches(APP, &patches).is_err());
    }
}
