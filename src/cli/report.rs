//! Report formatting and printing utilities.
//!
//! Issues are displayed cargo-style; run results as a short colored summary.
//! Kept apart from the engine so lingofit can be used as a library.

use std::io::{self, Write};

use colored::Colorize;
use unicode_width::UnicodeWidthStr;

use crate::core::classify::CandidateKind;
use crate::core::report::{CandidateStatus, RunReport, RunSummary};
use crate::core::{ConvertOutcome, ProjectScan};
use crate::issues::{Issue, Report, ReportLocation, Severity};

/// Success mark for consistent output formatting.
pub const SUCCESS_MARK: &str = "\u{2713}"; // ✓

/// Failure mark for consistent output formatting.
pub const FAILURE_MARK: &str = "\u{2718}"; // ✘

/// Print issues in cargo-style format to stdout.
pub fn report(issues: &[Issue]) {
    report_to(issues, &mut io::stdout().lock());
}

/// Print issues to a custom writer.
///
/// Useful for testing or redirecting output.
pub fn report_to<W: Write>(issues: &[Issue], writer: &mut W) {
    if issues.is_empty() {
        return;
    }

    let mut sorted = issues.to_vec();
    sorted.sort();

    // Calculate max line number width for alignment
    let max_line_width = calculate_max_line_width(&sorted);

    for issue in &sorted {
        print_issue(issue, writer, max_line_width);
    }

    print_problem_count(&sorted, writer);
}

/// Print the candidates a scan found, followed by a one-line summary.
pub fn print_scan(scan: &ProjectScan, run: &RunReport, verbose: bool) {
    print_scan_to(scan, run, verbose, &mut io::stdout().lock());
}

pub fn print_scan_to<W: Write>(scan: &ProjectScan, run: &RunReport, verbose: bool, writer: &mut W) {
    if verbose {
        report_to(&scan.issues, writer);
    }

    for (candidate, window) in run.candidates.iter().zip(&scan.windows) {
        let kind = match candidate.kind {
            CandidateKind::Simple => "simple".green(),
            CandidateKind::Complex => "complex".cyan(),
        };
        let mut line = format!(
            "{}:{}  {}  {}  \"{}\"",
            candidate.file,
            candidate.line,
            kind,
            candidate.site.to_string().dimmed(),
            candidate.text
        );
        if let Some(window) = window {
            line.push_str(&format!(
                "  (context: {} line(s){}{})",
                window.total_lines,
                if window.truncated { ", truncated" } else { "" },
                if window.depth_limited { ", depth-limited" } else { "" }
            ));
        }
        if candidate.status == CandidateStatus::Ambiguous {
            line.push_str(&format!("  {}", "ambiguous".yellow()));
        }
        let _ = writeln!(writer, "{}", line);
    }

    let s = &run.summary;
    if s.candidates == 0 {
        let _ = writeln!(
            writer,
            "{} {}",
            SUCCESS_MARK.green(),
            format!("Scanned {} - no hardcoded text found", files(s.files_scanned)).green()
        );
    } else {
        let _ = writeln!(
            writer,
            "\nFound {} candidate(s) in {} ({} simple, {} complex, {} ambiguous)",
            s.candidates,
            files(s.files_scanned),
            s.simple,
            s.complex,
            s.ambiguous
        );
    }
    print_skipped_warning_to(s.files_skipped, verbose, writer);
}

/// Print the outcome of a conversion run.
pub fn print_convert(outcome: &ConvertOutcome, verbose: bool) {
    print_convert_to(outcome, verbose, &mut io::stdout().lock());
}

pub fn print_convert_to<W: Write>(outcome: &ConvertOutcome, verbose: bool, writer: &mut W) {
    let shown: Vec<Issue> = outcome
        .issues
        .iter()
        .filter(|issue| verbose || issue.report_severity() == Severity::Error || is_run_issue(issue))
        .cloned()
        .collect();
    report_to(&shown, writer);

    let report = &outcome.report;
    let s = &report.summary;

    if s.dry_run {
        for candidate in report.candidates.iter().filter(|c| c.status == CandidateStatus::Staged) {
            let _ = writeln!(
                writer,
                "{}:{}  \"{}\" {} {}",
                candidate.file,
                candidate.line,
                candidate.text,
                "->".blue(),
                candidate.key.as_deref().unwrap_or_default()
            );
        }
    }

    print_counts(s, writer);

    for update in &report.dictionaries {
        let _ = writeln!(
            writer,
            "  {} {} ({} added, {} kept)",
            "dictionary".dimmed(),
            update.path.display(),
            update.added,
            update.kept
        );
    }
    if let Some(path) = &outcome.report_path {
        let _ = writeln!(writer, "  {} {}", "report".dimmed(), path.display());
    }
    if s.dry_run && s.staged > 0 {
        let _ = writeln!(writer, "Run with {} to write these changes.", "--apply".cyan());
    }
    print_skipped_warning_to(s.files_skipped, verbose, writer);
}

/// Issues that explain why a candidate did not land.
fn is_run_issue(issue: &Issue) -> bool {
    matches!(issue, Issue::OracleUnavailable(_))
}

fn print_counts<W: Write>(s: &RunSummary, writer: &mut W) {
    if s.candidates == 0 {
        let _ = writeln!(
            writer,
            "{} {}",
            SUCCESS_MARK.green(),
            format!("Scanned {} - no hardcoded text found", files(s.files_scanned)).green()
        );
        return;
    }

    if s.dry_run {
        let _ = writeln!(
            writer,
            "{} {} of {} candidate(s)",
            "Would convert".green().bold(),
            s.staged,
            s.candidates
        );
    } else {
        let _ = writeln!(
            writer,
            "{} {} of {} candidate(s) in {}, {} new key(s)",
            "Converted".green().bold(),
            s.applied,
            s.candidates,
            files(s.files_written),
            s.keys_created
        );
    }

    let mut left = Vec::new();
    for (count, label) in [
        (s.ambiguous, "ambiguous"),
        (s.declined, "declined"),
        (s.uncovered, "outside a component"),
    ] {
        if count > 0 {
            left.push(format!("{} {}", count, label));
        }
    }
    if !left.is_empty() {
        let _ = writeln!(writer, "  {} {}", "skipped:".dimmed(), left.join(", "));
    }

    let failed = s.rejected + s.conflicted + s.unresolved;
    if failed > 0 {
        let _ = writeln!(
            writer,
            "{} {} candidate(s) not converted ({} rejected, {} conflicted, {} unresolved)",
            FAILURE_MARK.red(),
            failed,
            s.rejected,
            s.conflicted,
            s.unresolved
        );
    }
}

fn files(count: usize) -> String {
    format!("{} {}", count, if count == 1 { "file" } else { "files" })
}

/// Print a warning about files that were skipped.
fn print_skipped_warning_to<W: Write>(count: usize, verbose: bool, writer: &mut W) {
    if count > 0 && !verbose {
        let _ = writeln!(
            writer,
            "{} {} file(s) could not be scanned (use {} for details)",
            "warning:".bold().yellow(),
            count,
            "-v".cyan()
        );
    }
}

// ============================================================
// Internal Functions
// ============================================================

fn print_issue<W: Write>(issue: &Issue, writer: &mut W, max_line_width: usize) {
    let loc = issue.location();
    let (file_path, line, col, source_line) = extract_location_info(&loc);

    // Print severity and message (cargo-style)
    let severity = issue.report_severity();
    let severity_str = match severity {
        Severity::Error => "error".bold().red(),
        Severity::Warning => "warning".bold().yellow(),
    };

    let _ = writeln!(
        writer,
        "{}: \"{}\"  {}",
        severity_str,
        issue.message(),
        issue.kind().to_string().dimmed().cyan()
    );

    // Print clickable location: --> path:line:col
    if line > 0 {
        let _ = writeln!(writer, "  {} {}:{}:{}", "-->".blue(), file_path, line, col);
    } else {
        let _ = writeln!(writer, "  {} {}", "-->".blue(), file_path);
    }

    // Print source context if available
    if let Some(source_line) = source_line {
        let caret_char = match severity {
            Severity::Error => "^".red(),
            Severity::Warning => "^".yellow(),
        };

        let _ = writeln!(
            writer,
            "{:>width$} {}",
            "",
            "|".blue(),
            width = max_line_width
        );
        let _ = writeln!(
            writer,
            "{:>width$} {} {}",
            line.to_string().blue(),
            "|".blue(),
            source_line,
            width = max_line_width
        );

        // Caret pointing to the column (col is 1-based)
        let prefix = if col > 1 {
            source_line.chars().take(col - 1).collect::<String>()
        } else {
            String::new()
        };
        let caret_padding = UnicodeWidthStr::width(prefix.as_str());
        let _ = writeln!(
            writer,
            "{:>width$} {} {:>padding$}{}",
            "",
            "|".blue(),
            "",
            caret_char,
            width = max_line_width,
            padding = caret_padding
        );
    }

    // Print details if present (cargo-style note)
    if let Some(details) = issue.details() {
        let _ = writeln!(
            writer,
            "{:>width$} {} {} {}",
            "",
            "=".blue(),
            "note:".bold(),
            details,
            width = max_line_width
        );
    }

    let _ = writeln!(writer); // Empty line between issues
}

fn print_problem_count<W: Write>(issues: &[Issue], writer: &mut W) {
    let total_errors = issues
        .iter()
        .filter(|i| i.report_severity() == Severity::Error)
        .count();
    let total_warnings = issues.len() - total_errors;

    let _ = writeln!(
        writer,
        "{} {} problems ({} {}, {} {})\n",
        FAILURE_MARK.red(),
        issues.len(),
        total_errors,
        if total_errors == 1 { "error" } else { "errors" }.red(),
        total_warnings,
        if total_warnings == 1 {
            "warning"
        } else {
            "warnings"
        }
        .yellow()
    );
}

fn extract_location_info<'a>(
    loc: &'a ReportLocation<'a>,
) -> (&'a str, usize, usize, Option<&'a str>) {
    match loc {
        ReportLocation::Source(ctx) => (
            &ctx.file_path,
            ctx.line,
            ctx.col,
            ctx.source_line.as_deref(),
        ),
        ReportLocation::File { path } => (path, 0, 0, None),
    }
}

fn calculate_max_line_width(issues: &[Issue]) -> usize {
    issues
        .iter()
        .map(|i| i.location().line())
        .max()
        .map(|n| n.to_string().len())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::issues::{ScanErrorIssue, SourceLocation, ValidationFailedIssue};

    fn render(issues: &[Issue]) -> String {
        colored::control::set_override(false);
        let mut out = Vec::new();
        report_to(issues, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_issue_with_source_line() {
        let issue = Issue::OracleUnavailable(crate::issues::OracleUnavailableIssue {
            location: SourceLocation::new("./src/App.tsx", 3, 10)
                .with_source_line("  return <p>Hello</p>;"),
            reason: "oracle call timed out after 100ms".to_string(),
        });
        let out = render(&[issue]);

        assert!(out.contains("warning: \"oracle call timed out after 100ms\"  oracle-unavailable"));
        assert!(out.contains("--> ./src/App.tsx:3:10"));
        assert!(out.contains("3 |   return <p>Hello</p>;"));
        assert!(out.contains("|          ^"));
        assert!(out.contains("1 problems (0 errors, 1 warning)"));
    }

    #[test]
    fn test_file_level_issue_has_no_line() {
        let issues = vec![
            Issue::ValidationFailed(ValidationFailedIssue {
                file_path: "./src/B.tsx".to_string(),
                error: "line 2: Expected '}'".to_string(),
                rejected_patches: 2,
            }),
            Issue::ScanError(ScanErrorIssue {
                file_path: "./src/A.tsx".to_string(),
                error: "not valid UTF-8".to_string(),
            }),
        ];
        let out = render(&issues);

        assert!(out.contains("  --> ./src/B.tsx\n"));
        assert!(out.contains("= note: 2 patch(es) rejected, file left untouched"));
        // Sorted by path.
        assert!(out.find("./src/A.tsx").unwrap() < out.find("./src/B.tsx").unwrap());
        assert!(out.contains("2 problems (1 error, 1 warning)"));
    }

    #[test]
    fn test_no_issues_prints_nothing() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn test_counts_in_apply_mode() {
        colored::control::set_override(false);
        let outcome = ConvertOutcome {
            report: RunReport {
                summary: RunSummary {
                    files_scanned: 2,
                    candidates: 4,
                    applied: 2,
                    files_written: 1,
                    keys_created: 2,
                    declined: 1,
                    unresolved: 1,
                    ..Default::default()
                },
                ..Default::default()
            },
            issues: Vec::new(),
            report_path: Some(PathBuf::from("./i18n-report.json")),
        };
        let mut out = Vec::new();
        print_convert_to(&outcome, false, &mut out);
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Converted 2 of 4 candidate(s) in 1 file, 2 new key(s)"));
        assert!(out.contains("skipped: 1 declined"));
        assert!(out.contains("1 candidate(s) not converted (0 rejected, 0 conflicted, 1 unresolved)"));
        assert!(out.contains("report ./i18n-report.json"));
    }
}
