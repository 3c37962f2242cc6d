//! Immutable source snapshots and the span/line types every other phase uses.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::issues::SourceLocation;

/// Index of a file in the run's scan order (sorted by path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FileId(pub usize);

/// Half-open byte range `[lo, hi)` into a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Span {
    pub lo: usize,
    pub hi: usize,
}

impl Span {
    pub fn new(lo: usize, hi: usize) -> Self {
        debug_assert!(lo <= hi);
        Self { lo, hi }
    }

    pub fn len(&self) -> usize {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.lo == self.hi
    }

    pub fn contains(&self, other: Span) -> bool {
        self.lo <= other.lo && other.hi <= self.hi
    }

    /// Two spans overlap when they share at least one byte. Two empty
    /// insertion points at the same offset also count as overlapping.
    pub fn overlaps(&self, other: Span) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.lo == other.lo || (self.lo < other.hi && other.lo < self.hi);
        }
        self.lo < other.hi && other.lo < self.hi
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi)
    }
}

/// Inclusive 1-indexed line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start >= 1 && start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Overlapping or directly adjacent ranges can be merged into one.
    pub fn touches(&self, other: LineRange) -> bool {
        self.start <= other.end + 1 && other.start <= self.end + 1
    }

    pub fn merge(&self, other: LineRange) -> LineRange {
        LineRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A scanned file. Never mutated once created; the patch applier re-reads
/// the disk copy and compares against this snapshot.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: FileId,
    pub path: PathBuf,
    pub content: String,
    pub hash: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(id: FileId, path: impl Into<PathBuf>, content: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            id,
            path: path.into(),
            hash: content_hash(&content),
            content,
            line_starts,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    pub fn byte_len(&self) -> usize {
        self.content.len()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-indexed line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    /// Lines covered by `span`. An empty span covers the line it sits on.
    pub fn line_range(&self, span: Span) -> LineRange {
        let start = self.line_of(span.lo);
        let end = if span.is_empty() {
            start
        } else {
            self.line_of(span.hi - 1)
        };
        LineRange::new(start, end)
    }

    /// Byte span of whole lines, excluding the final newline.
    pub fn lines_span(&self, lines: LineRange) -> Span {
        let lo = self.line_starts[lines.start - 1];
        let hi = self
            .line_starts
            .get(lines.end)
            .map(|next| next - 1)
            .unwrap_or(self.content.len());
        Span::new(lo, hi.max(lo))
    }

    pub fn slice(&self, span: Span) -> &str {
        &self.content[span.lo..span.hi]
    }

    pub fn line_text(&self, line: usize) -> &str {
        self.slice(self.lines_span(LineRange::new(line, line)))
            .trim_end_matches('\r')
    }

    /// 1-indexed column of `offset`, counted in characters.
    pub fn column_of(&self, offset: usize) -> usize {
        let line_start = self.line_starts[self.line_of(offset) - 1];
        self.content[line_start..offset].chars().count() + 1
    }

    /// Report location of `offset`, with its source line attached.
    pub fn location(&self, offset: usize) -> SourceLocation {
        let line = self.line_of(offset);
        SourceLocation::new(self.display_path(), line, self.column_of(offset))
            .with_source_line(self.line_text(line))
    }

    pub fn in_bounds(&self, span: Span) -> bool {
        span.lo <= span.hi
            && span.hi <= self.content.len()
            && self.content.is_char_boundary(span.lo)
            && self.content.is_char_boundary(span.hi)
    }
}

/// SHA-256 of `content`, lowercase hex.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn file(content: &str) -> SourceFile {
        SourceFile::new(FileId(0), "app.tsx", content.to_string())
    }

    #[test]
    fn test_line_of() {
        let f = file("a\nbc\n\nd");
        assert_eq!(f.line_of(0), 1);
        assert_eq!(f.line_of(1), 1);
        assert_eq!(f.line_of(2), 2);
        assert_eq!(f.line_of(5), 3);
        assert_eq!(f.line_of(6), 4);
        assert_eq!(f.line_count(), 4);
    }

    #[test]
    fn test_line_range_and_lines_span() {
        let f = file("one\ntwo\nthree\n");
        let span = Span::new(5, 10);
        assert_eq!(f.slice(span), "wo\nth");
        let lines = f.line_range(span);
        assert_eq!(lines, LineRange::new(2, 3));
        assert_eq!(f.slice(f.lines_span(lines)), "two\nthree");
        assert_eq!(f.line_text(1), "one");
    }

    #[test]
    fn test_column_counts_chars() {
        let f = file("<p>你好 world</p>");
        let offset = f.content.find("world").unwrap();
        assert_eq!(f.column_of(offset), 7);
    }

    #[test]
    fn test_span_overlap() {
        assert!(Span::new(0, 5).overlaps(Span::new(4, 6)));
        assert!(!Span::new(0, 5).overlaps(Span::new(5, 6)));
        assert!(Span::new(3, 3).overlaps(Span::new(3, 3)));
        assert!(Span::new(2, 6).overlaps(Span::new(3, 3)));
        assert!(!Span::new(0, 3).overlaps(Span::new(3, 3)));
    }

    #[test]
    fn test_line_range_touches() {
        let a = LineRange::new(1, 3);
        assert!(a.touches(LineRange::new(4, 6)));
        assert!(a.touches(LineRange::new(2, 2)));
        assert!(!a.touches(LineRange::new(5, 6)));
        assert_eq!(a.merge(LineRange::new(4, 6)), LineRange::new(1, 6));
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(file("abc").hash, content_hash("abc"));
    }
}
