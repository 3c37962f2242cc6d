//! Candidate discovery: finds text sites inside markup and tags each one
//! Simple, Complex or Skip.
//!
//! - `classifier`: the AST visitor and expression rules
//! - `heuristics`: text-level filters shared by every Simple site

mod classifier;
mod heuristics;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::config::Config;
use crate::core::source::{FileId, LineRange, Span};

pub use classifier::{FileClassification, classify_module};
pub use heuristics::classify_text;

/// Stable candidate identifier: owning file plus position in that file's
/// offset-ordered candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CandidateId {
    pub file: FileId,
    pub index: usize,
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.0, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Simple,
    Complex,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKind::Simple => write!(f, "simple"),
            CandidateKind::Complex => write!(f, "complex"),
        }
    }
}

/// Where in the markup a candidate sits. Decides the replacement syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteKind {
    /// Literal text between tags: `<p>Hello</p>`
    JsxText,
    /// Quoted attribute value: `placeholder="Search"`
    JsxAttr,
    /// String literal inside an expression container: `{ok ? "Yes" : "No"}`
    ExprLiteral,
    /// Dynamic expression: `{getGreeting(user)}`
    Expression,
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SiteKind::JsxText => "jsx-text",
            SiteKind::JsxAttr => "jsx-attr",
            SiteKind::ExprLiteral => "expr-literal",
            SiteKind::Expression => "expression",
        };
        write!(f, "{}", s)
    }
}

/// Why a site was not turned into a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Whitespace,
    TooShort,
    NoLetters,
    Ignored,
    CodeLike,
    /// Already goes through a lookup function, e.g. `t("nav.home")`.
    LookupCall,
}

/// Outcome of classifying one site. Exactly one variant per site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Simple { site: SiteKind, text: String },
    Complex { site: SiteKind, source: String },
    Skip(SkipReason),
}

/// A discovered text site. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringCandidate {
    pub id: CandidateId,
    pub file: FileId,
    pub span: Span,
    pub lines: LineRange,
    pub kind: CandidateKind,
    pub site: SiteKind,
    /// Raw text for Simple candidates, expression source for Complex ones.
    pub text: String,
    /// Free identifiers of a Complex expression, in order of appearance.
    pub identifiers: Vec<String>,
    /// Set when text and dynamic expressions are mixed in one element.
    /// Ambiguous candidates are reported but never patched.
    pub ambiguous: bool,
}

impl StringCandidate {
    pub fn is_simple(&self) -> bool {
        self.kind == CandidateKind::Simple
    }
}

/// Classifier settings derived from the config.
#[derive(Debug, Clone, Default)]
pub struct ClassifyOptions {
    pub translatable_attributes: HashSet<String>,
    pub ignore_texts: HashSet<String>,
    pub lookup_functions: HashSet<String>,
}

impl ClassifyOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            translatable_attributes: config.translatable_attributes.iter().cloned().collect(),
            ignore_texts: config.ignore_texts.iter().cloned().collect(),
            lookup_functions: config.lookup_functions.iter().cloned().collect(),
        }
    }
}
