//! Run orchestration.
//!
//! A run is split in two halves:
//! 1. [`scan_project`]: scan, classify, index definitions, build context
//!    windows. Pure analysis, nothing is written.
//! 2. [`convert_project`]: allocate keys, consult the oracle, stage and apply
//!    patches per file, then write dictionaries and the report.
//!
//! Files are processed in parallel with rayon. The dependency index is built
//! once every file has been analyzed and is read-only afterwards.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::config::{Config, InsertHooks};
use crate::core::cancel::CancelFlag;
use crate::core::classify::{
    CandidateId, ClassifyOptions, FileClassification, StringCandidate, classify_module,
};
use crate::core::context_window::{ContextWindow, build_context_window};
use crate::core::dictionary::{load_existing_entries, open_dictionaries, write_dictionaries};
use crate::core::file_scanner::{load_sources, scan_files};
use crate::core::graph::{
    DependencyIndex, FileSymbols, Resolution, collect_symbols, resolve_dependencies,
};
use crate::core::keys::KeyTable;
use crate::core::oracle::{
    KEY_PLACEHOLDER, Oracle, OracleOutcome, OracleQueue, OracleRequest, OracleResponse,
    QueueSettings,
};
use crate::core::parsers::jsx::parse_jsx_source;
use crate::core::patch::{
    ApplyMode, FileApplyOutcome, HookOutline, Patch, PatchKind, PatchStatus, SwcValidator, Validator,
    apply_file_patches, lookup_replacement, outline_hooks, plan_hooks,
};
use crate::core::report::{CandidateReport, CandidateStatus, RunReport, RunSummary};
use crate::core::source::{FileId, SourceFile};
use crate::issues::{
    ContextBudgetIssue, DependencyCycleIssue, Diagnostic, DictionaryWriteIssue, Issue,
    OracleUnavailableIssue, Report, RunError, ScanErrorIssue,
};

/// Everything the analysis half learned about a project.
pub struct ProjectScan {
    pub root: PathBuf,
    pub files: Vec<SourceFile>,
    /// Paths that were found but never became a usable snapshot.
    pub files_skipped: usize,
    /// All candidates, grouped by file and ordered by start offset.
    pub candidates: Vec<StringCandidate>,
    /// Context window per candidate. Only Complex, unambiguous candidates
    /// have one.
    pub windows: Vec<Option<ContextWindow>>,
    pub issues: Vec<Issue>,
    outlines: Vec<HookOutline>,
}

impl ProjectScan {
    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.0]
    }

    /// Path of `file` relative to the scan root, for reports.
    pub fn relative_path(&self, file: &SourceFile) -> String {
        file.path
            .strip_prefix(&self.root)
            .unwrap_or(&file.path)
            .to_string_lossy()
            .to_string()
    }
}

/// Collaborators injected into a conversion run.
#[derive(Clone)]
pub struct Engine {
    pub oracle: Arc<dyn Oracle>,
    pub validator: Arc<dyn Validator>,
    pub cancel: CancelFlag,
}

impl Engine {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            validator: Arc::new(SwcValidator),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of a conversion run.
pub struct ConvertOutcome {
    pub report: RunReport,
    /// Every non-fatal issue of the run, sorted.
    pub issues: Vec<Issue>,
    /// Where the report was written. `None` for dry runs.
    pub report_path: Option<PathBuf>,
}

struct FileAnalysis {
    classification: FileClassification,
    symbols: FileSymbols,
    outline: HookOutline,
    parse_error: Option<String>,
}

fn analyze_file(file: &SourceFile, options: &ClassifyOptions, lookup_fn: &str) -> FileAnalysis {
    match parse_jsx_source(&file.content, &file.path) {
        Ok(parsed) => FileAnalysis {
            classification: classify_module(file, &parsed, options),
            symbols: collect_symbols(&parsed),
            outline: outline_hooks(file, &parsed, lookup_fn),
            parse_error: None,
        },
        Err(e) => {
            tracing::warn!(file = %file.display_path(), error = %e, "skipping unparsable file");
            FileAnalysis {
                classification: FileClassification::default(),
                symbols: FileSymbols::default(),
                outline: HookOutline::default(),
                parse_error: Some(e.to_string()),
            }
        }
    }
}

/// Analyze every eligible file under `root`.
///
/// Fails only when `root` is not a directory. Unreadable and unparsable
/// files become scan errors and the rest of the project is still analyzed.
pub fn scan_project(root: &Path, config: &Config) -> Result<ProjectScan> {
    if !root.is_dir() {
        return Err(RunError::RootNotFound(root.to_path_buf()).into());
    }

    let scan = scan_files(root, &config.includes, &config.ignores, config.ignore_test_files);
    if scan.skipped_count > 0 {
        tracing::warn!(count = scan.skipped_count, "some paths could not be accessed");
    }

    let (files, failures) = load_sources(&scan.files);
    let mut issues: Vec<Issue> = failures
        .into_iter()
        .map(|failure| {
            Issue::ScanError(ScanErrorIssue {
                file_path: failure.path.to_string_lossy().to_string(),
                error: failure.error,
            })
        })
        .collect();
    let mut files_skipped = scan.skipped_count + issues.len();
    tracing::info!(files = files.len(), "scanned");

    let options = ClassifyOptions::from_config(config);
    let lookup_fn = config.lookup_function();
    let analyses: Vec<FileAnalysis> = files
        .par_iter()
        .map(|file| analyze_file(file, &options, lookup_fn))
        .collect();

    let mut candidates = Vec::new();
    let mut symbols = Vec::with_capacity(files.len());
    let mut outlines = Vec::with_capacity(files.len());
    for (file, analysis) in files.iter().zip(analyses) {
        if let Some(error) = analysis.parse_error {
            files_skipped += 1;
            issues.push(Issue::ScanError(ScanErrorIssue {
                file_path: file.display_path(),
                error,
            }));
        }
        candidates.extend(analysis.classification.candidates);
        issues.extend(analysis.classification.issues);
        symbols.push(analysis.symbols);
        outlines.push(analysis.outline);
    }
    tracing::info!(candidates = candidates.len(), "classified");

    let index = DependencyIndex::build(&files, symbols);

    let resolved: Vec<(Option<ContextWindow>, Vec<Issue>)> = candidates
        .par_iter()
        .map(|candidate| {
            if candidate.is_simple() || candidate.ambiguous {
                return (None, Vec::new());
            }
            let file = &files[candidate.file.0];
            let resolution =
                resolve_dependencies(&index, candidate, config.max_dependency_depth);
            if !resolution.opaque.is_empty() {
                tracing::debug!(candidate = %candidate.id, opaque = ?resolution.opaque, "opaque identifiers");
            }

            let mut found = Vec::new();
            for cycle in &resolution.cycles {
                found.push(Issue::DependencyCycle(DependencyCycleIssue {
                    location: file.location(candidate.span.lo),
                    cycle: cycle.clone(),
                }));
            }

            let window =
                build_context_window(candidate, &resolution, &index, config.max_context_lines);
            if window.truncated {
                found.push(Issue::ContextBudget(ContextBudgetIssue {
                    location: file.location(candidate.span.lo),
                    needed_lines: needed_lines(candidate, &resolution, &index),
                    budget: config.max_context_lines,
                }));
            }
            (Some(window), found)
        })
        .collect();

    let mut windows = Vec::with_capacity(candidates.len());
    for (window, found) in resolved {
        windows.push(window);
        issues.extend(found);
    }
    tracing::info!(
        windows = windows.iter().flatten().count(),
        "context windows built"
    );

    Ok(ProjectScan {
        root: root.to_path_buf(),
        files,
        files_skipped,
        candidates,
        windows,
        issues,
        outlines,
    })
}

/// Lines the window would span with every dependency included, unmerged.
fn needed_lines(candidate: &StringCandidate, resolution: &Resolution, index: &DependencyIndex) -> usize {
    candidate.lines.len()
        + resolution
            .dependencies
            .iter()
            .map(|d| index.node(d.node).lines.len())
            .sum::<usize>()
}

/// The report of an analysis-only run.
pub fn scan_report(scan: &ProjectScan) -> RunReport {
    let mut summary = RunSummary {
        dry_run: true,
        files_scanned: scan.files.len(),
        files_skipped: scan.files_skipped,
        candidates: scan.candidates.len(),
        ..Default::default()
    };

    let candidates = scan
        .candidates
        .iter()
        .zip(&scan.windows)
        .map(|(candidate, window)| {
            let status = if candidate.ambiguous {
                CandidateStatus::Ambiguous
            } else {
                CandidateStatus::Found
            };
            summary.count(status);
            candidate_report(scan, candidate, window.as_ref(), &CandidateState::new(status))
        })
        .collect();
    count_kinds(&mut summary, &scan.candidates);

    let mut issues = scan.issues.clone();
    issues.sort();
    RunReport {
        summary,
        candidates,
        diagnostics: issues.iter().map(Diagnostic::from).collect(),
        dictionaries: Vec::new(),
    }
}

/// Per-candidate bookkeeping while a conversion runs.
#[derive(Debug, Clone)]
struct CandidateState {
    status: CandidateStatus,
    key: Option<String>,
    confidence: Option<f64>,
    diagnostics: Vec<String>,
}

impl CandidateState {
    fn new(status: CandidateStatus) -> Self {
        Self {
            status,
            key: None,
            confidence: None,
            diagnostics: Vec::new(),
        }
    }

    fn settle(&mut self, status: CandidateStatus, diagnostic: impl Into<String>) {
        self.status = status;
        self.diagnostics.push(diagnostic.into());
    }
}

/// An oracle answer turned into a key and replacement text.
struct Accepted {
    key: String,
    created: bool,
    replacement: String,
}

/// Convert every candidate the scan found.
///
/// Without `apply` this is a dry run: the oracle is consulted and every
/// rewrite is validated, but no source file, dictionary or report is written
/// and successful patches end `staged`.
pub fn convert_project(
    scan: &ProjectScan,
    config: &Config,
    engine: &Engine,
    apply: bool,
) -> Result<ConvertOutcome> {
    let lookup_fn = config.lookup_function();
    let existing = load_existing_entries(&scan.root, &config.locales_dir, &config.source_locale)
        .context("Failed to load the source locale dictionary")?;
    let writers = open_dictionaries(&scan.root, &config.locales_dir, &config.all_locales())
        .context("Failed to open the locale dictionaries")?;
    let table = KeyTable::with_existing(existing);
    let mut issues = scan.issues.clone();
    let mut created_keys: HashSet<String> = HashSet::new();

    let mut states: Vec<CandidateState> = scan
        .candidates
        .iter()
        .map(|c| {
            if c.ambiguous {
                CandidateState::new(CandidateStatus::Ambiguous)
            } else {
                CandidateState::new(CandidateStatus::Unresolved)
            }
        })
        .collect();

    // Simple candidates get their key before the oracle is asked, so the
    // request can name it.
    let requested: Vec<usize> = (0..scan.candidates.len())
        .filter(|&i| !scan.candidates[i].ambiguous)
        .collect();
    for &i in &requested {
        let candidate = &scan.candidates[i];
        if candidate.is_simple() {
            let allocation = table.allocate(&candidate.text);
            if allocation.created {
                created_keys.insert(allocation.key.clone());
            }
            states[i].key = Some(allocation.key);
        }
    }

    let existing_keys: Arc<[String]> = table.keys().into();
    let target_locales = config.target_locales();
    let requests: Vec<OracleRequest> = requested
        .iter()
        .map(|&i| {
            let candidate = &scan.candidates[i];
            let context = if candidate.is_simple() {
                None
            } else {
                scan.windows[i].as_ref().map(|w| w.render(&scan.files))
            };
            OracleRequest {
                candidate: candidate.id,
                kind: candidate.kind,
                file: scan.relative_path(scan.file(candidate.file)),
                subject: candidate.text.clone(),
                context,
                key: states[i].key.clone(),
                source_locale: config.source_locale.clone(),
                locales: target_locales.clone(),
                existing_keys: Arc::clone(&existing_keys),
            }
        })
        .collect();

    let queue = Arc::new(OracleQueue::new(
        Arc::clone(&engine.oracle),
        QueueSettings::from(&config.oracle),
    ));
    tracing::info!(requests = requests.len(), oracle = queue.oracle_name(), "consulting oracle");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the oracle runtime")?;
    let outcomes = runtime.block_on(queue.run_all(requests, &engine.cancel));
    let stats = queue.stats();

    if engine.cancel.is_cancelled() {
        return Err(RunError::Cancelled.into());
    }
    if stats.unreachable() {
        return Err(RunError::OracleUnreachable {
            attempts: stats.attempted,
        }
        .into());
    }

    let mut per_file: BTreeMap<FileId, Vec<Patch>> = BTreeMap::new();
    for (i, outcome) in requested.into_iter().zip(outcomes) {
        let candidate = &scan.candidates[i];
        let file = scan.file(candidate.file);
        let state = &mut states[i];

        let response = match outcome {
            OracleOutcome::Answered(response) => response,
            OracleOutcome::Unresolved(reason) => {
                state.settle(CandidateStatus::Unresolved, reason.clone());
                issues.push(Issue::OracleUnavailable(OracleUnavailableIssue {
                    location: file.location(candidate.span.lo),
                    reason,
                }));
                continue;
            }
        };

        let window = scan.windows[i].as_ref();
        let confidence = window.map_or(response.confidence, |w| w.adjust_confidence(response.confidence));
        state.confidence = Some(confidence);

        match accept_answer(candidate, state.key.as_deref(), &response, confidence, &table, config) {
            Ok(accepted) => {
                if accepted.created {
                    created_keys.insert(accepted.key.clone());
                }
                tracing::debug!(candidate = %candidate.id, key = %accepted.key, "staging lookup");
                let mut patch = Patch::new(
                    candidate.file,
                    candidate.span,
                    file.slice(candidate.span),
                    accepted.replacement,
                    PatchKind::Lookup(candidate.id),
                );
                patch.stage();
                state.key = Some(accepted.key);
                state.status = CandidateStatus::Staged;
                per_file.entry(candidate.file).or_default().push(patch);
            }
            Err(reason) => {
                tracing::debug!(candidate = %candidate.id, %reason, "declined");
                state.settle(CandidateStatus::Declined, reason);
            }
        }
    }

    let positions: HashMap<CandidateId, usize> = scan
        .candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();

    if config.insert_hooks == InsertHooks::Auto {
        for (file_id, patches) in per_file.iter_mut() {
            let sites: Vec<_> = patches
                .iter()
                .filter_map(|p| p.candidate().map(|id| (id, p.span)))
                .collect();
            let plan = plan_hooks(scan.file(*file_id), &scan.outlines[file_id.0], &sites, lookup_fn);

            if !plan.uncovered.is_empty() {
                patches.retain(|p| p.candidate().is_none_or(|id| !plan.uncovered.contains(&id)));
                for id in &plan.uncovered {
                    states[positions[id]].settle(
                        CandidateStatus::Uncovered,
                        format!("no component in scope to declare `{}`", lookup_fn),
                    );
                }
            }
            for mut hook in plan.patches {
                hook.stage();
                patches.push(hook);
            }
        }
    }

    let groups: Vec<(FileId, Vec<Patch>)> = per_file
        .into_iter()
        .filter(|(_, patches)| patches.iter().any(|p| p.candidate().is_some()))
        .collect();
    tracing::info!(files = groups.len(), apply, "patching");
    let mode = ApplyMode::new(apply, config.backup);

    let applied: Vec<(Vec<Patch>, Option<FileApplyOutcome>)> = groups
        .into_par_iter()
        .map(|(file_id, mut patches)| {
            if engine.cancel.is_cancelled() {
                return (patches, None);
            }
            let outcome =
                apply_file_patches(scan.file(file_id), &mut patches, engine.validator.as_ref(), mode);
            (patches, Some(outcome))
        })
        .collect();

    let mut files_written = 0;
    for (patches, outcome) in applied {
        let Some(outcome) = outcome else {
            for id in patches.iter().filter_map(Patch::candidate) {
                states[positions[&id]]
                    .settle(CandidateStatus::Unresolved, "run cancelled before the file was patched");
            }
            continue;
        };

        if outcome.written {
            files_written += 1;
        }
        let note = outcome
            .issue
            .as_ref()
            .map(|issue| format!("{}: {}", issue.kind(), issue.message()));
        for patch in &patches {
            let Some(id) = patch.candidate() else {
                continue;
            };
            let state = &mut states[positions[&id]];
            state.status = match patch.status() {
                PatchStatus::Applied => CandidateStatus::Applied,
                PatchStatus::Staged => CandidateStatus::Staged,
                PatchStatus::Rejected => CandidateStatus::Rejected,
                PatchStatus::Conflicted => CandidateStatus::Conflicted,
                PatchStatus::Pending => CandidateStatus::Unresolved,
            };
            if let Some(note) = &note {
                state.diagnostics.push(note.clone());
            }
        }
        issues.extend(outcome.issue);
    }

    let landed: HashSet<&str> = states
        .iter()
        .filter(|s| matches!(s.status, CandidateStatus::Applied | CandidateStatus::Staged))
        .filter_map(|s| s.key.as_deref())
        .collect();

    let dictionaries = if apply && !landed.is_empty() {
        let entries: Vec<_> = table
            .entries()
            .into_iter()
            .filter(|e| landed.contains(e.key.as_str()))
            .collect();
        let (updates, failures) = write_dictionaries(writers, &config.source_locale, &entries);
        issues.extend(failures.into_iter().map(|failure| {
            Issue::DictionaryWrite(DictionaryWriteIssue {
                file_path: failure
                    .path
                    .strip_prefix(&scan.root)
                    .unwrap_or(&failure.path)
                    .to_string_lossy()
                    .to_string(),
                locale: failure.locale,
                error: format!("{:#}", failure.error),
            })
        }));
        updates
    } else {
        Vec::new()
    };

    let mut summary = RunSummary {
        dry_run: !apply,
        files_scanned: scan.files.len(),
        files_skipped: scan.files_skipped,
        candidates: scan.candidates.len(),
        keys_created: landed.iter().filter(|k| created_keys.contains(**k)).count(),
        files_written,
        oracle_calls: stats.attempted,
        oracle_successes: stats.succeeded,
        ..Default::default()
    };
    count_kinds(&mut summary, &scan.candidates);

    let candidates = scan
        .candidates
        .iter()
        .zip(&states)
        .zip(&scan.windows)
        .map(|((candidate, state), window)| {
            summary.count(state.status);
            candidate_report(scan, candidate, window.as_ref(), state)
        })
        .collect();

    issues.sort();
    let report = RunReport {
        summary,
        candidates,
        diagnostics: issues.iter().map(Diagnostic::from).collect(),
        dictionaries,
    };

    let report_path = if apply {
        Some(report.write(&scan.root)?)
    } else {
        None
    };
    tracing::info!(
        applied = report.summary.applied,
        staged = report.summary.staged,
        rejected = report.summary.rejected,
        conflicted = report.summary.conflicted,
        "run finished"
    );

    Ok(ConvertOutcome {
        report,
        issues,
        report_path,
    })
}

/// Turn an oracle answer into a key and replacement, or the reason it was
/// declined. Translations for configured target locales are recorded on the
/// key's entry.
fn accept_answer(
    candidate: &StringCandidate,
    simple_key: Option<&str>,
    response: &OracleResponse,
    confidence: f64,
    table: &KeyTable,
    config: &Config,
) -> Result<Accepted, String> {
    let minimum = f64::from(config.min_confidence);
    if confidence < minimum {
        return Err(format!(
            "confidence {:.2} is below the minimum {:.2}",
            confidence, minimum
        ));
    }

    let accepted = match simple_key {
        Some(key) => Accepted {
            key: key.to_string(),
            created: false,
            replacement: lookup_replacement(candidate.site, config.lookup_function(), key),
        },
        None => {
            let template = response
                .replacement
                .as_deref()
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| "the oracle suggested no replacement".to_string())?;
            let source_text = response
                .source_text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| "the oracle returned no source text".to_string())?;
            let allocation = table.allocate(source_text);
            Accepted {
                replacement: template.replace(KEY_PLACEHOLDER, &allocation.key),
                key: allocation.key,
                created: allocation.created,
            }
        }
    };

    for (locale, text) in &response.translations {
        if *locale != config.source_locale && config.locales.contains(locale) {
            table.set_translation(&accepted.key, locale, text);
        }
    }
    Ok(accepted)
}

fn count_kinds(summary: &mut RunSummary, candidates: &[StringCandidate]) {
    summary.simple = candidates.iter().filter(|c| c.is_simple()).count();
    summary.complex = candidates.len() - summary.simple;
}

fn candidate_report(
    scan: &ProjectScan,
    candidate: &StringCandidate,
    window: Option<&ContextWindow>,
    state: &CandidateState,
) -> CandidateReport {
    CandidateReport {
        file: scan.relative_path(scan.file(candidate.file)),
        candidate_id: candidate.id.to_string(),
        line: candidate.lines.start,
        kind: candidate.kind,
        site: candidate.site,
        text: candidate.text.clone(),
        key: state.key.clone(),
        status: state.status,
        truncated: window.is_some_and(|w| w.truncated),
        depth_limited: window.is_some_and(|w| w.depth_limited),
        confidence: state.confidence,
        diagnostics: state.diagnostics.clone(),
    }
}
