//! Minimal source context for a Complex candidate: its own lines plus the
//! lines of the definitions it depends on, merged and bounded.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::core::classify::{CandidateId, StringCandidate};
use crate::core::graph::{DependencyIndex, Resolution};
use crate::core::source::{FileId, LineRange, SourceFile};

/// A run of whole lines in one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSpan {
    pub file: FileId,
    pub lines: LineRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextWindow {
    pub candidate: CandidateId,
    /// Non-overlapping, grouped by file, ascending within a file.
    pub spans: Vec<WindowSpan>,
    pub total_lines: usize,
    /// Some dependency lines were left out to stay within the budget.
    pub truncated: bool,
    /// The dependency walk stopped at the depth bound.
    pub depth_limited: bool,
}

impl ContextWindow {
    /// Whether the window covers `lines` of `file` completely.
    pub fn covers(&self, file: FileId, lines: LineRange) -> bool {
        self.spans
            .iter()
            .any(|s| s.file == file && s.lines.start <= lines.start && lines.end <= s.lines.end)
    }

    /// Scale an oracle confidence for this window. Truncated windows halve it.
    pub fn adjust_confidence(&self, confidence: f64) -> f64 {
        if self.truncated {
            confidence / 2.0
        } else {
            confidence
        }
    }

    /// Render the window as annotated source, one block per span.
    pub fn render(&self, files: &[SourceFile]) -> String {
        let mut out = String::new();
        for span in &self.spans {
            let file = &files[span.file.0];
            let _ = writeln!(out, "// {}:{}", file.display_path(), span.lines);
            for line in span.lines.start..=span.lines.end {
                let _ = writeln!(out, "{}", file.line_text(line));
            }
        }
        out
    }
}

/// Build the context window of `candidate` from its resolved dependencies.
///
/// The candidate's own lines are always kept. Dependencies are added nearest
/// first while the merged total stays within `max_lines`.
pub fn build_context_window(
    candidate: &StringCandidate,
    resolution: &Resolution,
    index: &DependencyIndex,
    max_lines: usize,
) -> ContextWindow {
    let mut selected = vec![WindowSpan {
        file: candidate.file,
        lines: candidate.lines,
    }];
    let mut truncated = false;

    for dependency in &resolution.dependencies {
        let node = index.node(dependency.node);
        let span = WindowSpan {
            file: node.file,
            lines: node.lines,
        };
        selected.push(span);
        if total_lines(&merge(candidate.file, &selected)) > max_lines {
            selected.pop();
            truncated = true;
            tracing::debug!(
                candidate = %candidate.id,
                dependency = %node.name,
                "dependency left out of context window"
            );
        }
    }

    let spans = merge(candidate.file, &selected);
    let total = total_lines(&spans);
    if total > max_lines {
        truncated = true;
    }

    ContextWindow {
        candidate: candidate.id,
        spans,
        total_lines: total,
        truncated,
        depth_limited: resolution.depth_limited,
    }
}

fn total_lines(spans: &[WindowSpan]) -> usize {
    spans.iter().map(|s| s.lines.len()).sum()
}

/// Merge touching ranges per file. `spans` must be in selection order: the
/// own span first, then dependencies nearest first, which also orders the
/// files.
fn merge(own_file: FileId, spans: &[WindowSpan]) -> Vec<WindowSpan> {
    let mut file_order = vec![own_file];
    let mut by_file: BTreeMap<FileId, Vec<LineRange>> = BTreeMap::new();
    for span in spans {
        if !file_order.contains(&span.file) {
            file_order.push(span.file);
        }
        by_file.entry(span.file).or_default().push(span.lines);
    }

    let mut merged = Vec::new();
    for file in file_order {
        let Some(mut ranges) = by_file.remove(&file) else {
            continue;
        };
        ranges.sort();
        let mut current = ranges[0];
        for range in &ranges[1..] {
            if current.touches(*range) {
                current = current.merge(*range);
            } else {
                merged.push(WindowSpan {
                    file,
                    lines: current,
                });
                current = *range;
            }
        }
        merged.push(WindowSpan {
            file,
            lines: current,
        });
    }
    merged
}
