use swc_common::{BytePos, Span as SwcSpan, Spanned};
use swc_ecma_ast::{
    BinaryOp, Callee, Expr, JSXAttr, JSXAttrName, JSXAttrValue, JSXElement, JSXElementChild,
    JSXElementName, JSXExpr, JSXExprContainer, JSXFragment, JSXText, Lit, MemberProp, Module,
    OptChainBase,
};
use swc_ecma_visit::{Visit, VisitWith};

use super::{
    CandidateId, CandidateKind, Classification, ClassifyOptions, SiteKind, SkipReason,
    StringCandidate, classify_text,
};
use crate::core::idents::free_identifiers;
use crate::core::parsers::jsx::ParsedModule;
use crate::core::source::{SourceFile, Span};
use crate::issues::{AmbiguityReason, AmbiguousIssue, Issue, SourceLocation};

/// Everything the classifier found in one file.
#[derive(Debug, Default)]
pub struct FileClassification {
    /// Candidates ordered by start offset.
    pub candidates: Vec<StringCandidate>,
    /// Sites that were looked at and deliberately left alone.
    pub skipped: Vec<(Span, SkipReason)>,
    pub issues: Vec<Issue>,
}

/// Classify every text site inside markup in `parsed`.
pub fn classify_module(
    file: &SourceFile,
    parsed: &ParsedModule,
    options: &ClassifyOptions,
) -> FileClassification {
    let mut collector = CandidateCollector {
        file,
        parsed,
        options,
        found: Vec::new(),
        skipped: Vec::new(),
        issues: Vec::new(),
    };
    collector.collect(&parsed.module);
    collector.finish()
}

/// A classified site before ids are assigned.
struct Found {
    span: Span,
    kind: CandidateKind,
    site: SiteKind,
    text: String,
    identifiers: Vec<String>,
    ambiguous: bool,
}

/// Tracks whether an expression is being classified inside an attribute.
///
/// Attribute values only yield literals and string construction. A member
/// access like `alt={product.name}` is data, not prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExprContext {
    Children,
    Attribute,
}

struct CandidateCollector<'a> {
    file: &'a SourceFile,
    parsed: &'a ParsedModule,
    options: &'a ClassifyOptions,
    found: Vec<Found>,
    skipped: Vec<(Span, SkipReason)>,
    issues: Vec<Issue>,
}

impl<'a> CandidateCollector<'a> {
    fn collect(&mut self, module: &Module) {
        self.visit_module(module);
    }

    fn finish(mut self) -> FileClassification {
        self.found.sort_by_key(|f| (f.span.lo, f.span.hi));
        let file = self.file;
        let candidates = self
            .found
            .into_iter()
            .enumerate()
            .map(|(index, found)| StringCandidate {
                id: CandidateId {
                    file: file.id,
                    index,
                },
                file: file.id,
                span: found.span,
                lines: file.line_range(found.span),
                kind: found.kind,
                site: found.site,
                text: found.text,
                identifiers: found.identifiers,
                ambiguous: found.ambiguous,
            })
            .collect();
        self.skipped.sort_by_key(|(span, _)| span.lo);
        FileClassification {
            candidates,
            skipped: self.skipped,
            issues: self.issues,
        }
    }

    fn location(&self, span: Span) -> SourceLocation {
        self.file.location(span.lo)
    }

    /// Record a classification. Returns the index into `found` for
    /// candidates, `None` for skips.
    fn record(
        &mut self,
        span: Span,
        classification: Classification,
        identifiers: Vec<String>,
    ) -> Option<usize> {
        let (kind, site, text) = match classification {
            Classification::Simple { site, text } => (CandidateKind::Simple, site, text),
            Classification::Complex { site, source } => (CandidateKind::Complex, site, source),
            Classification::Skip(reason) => {
                tracing::debug!(
                    file = %self.file.display_path(),
                    span = %span,
                    ?reason,
                    "skipped site"
                );
                self.skipped.push((span, reason));
                return None;
            }
        };
        self.found.push(Found {
            span,
            kind,
            site,
            text,
            identifiers,
            ambiguous: false,
        });
        Some(self.found.len() - 1)
    }

    fn record_literal(&mut self, span: SwcSpan, value: &str, site: SiteKind) -> Option<usize> {
        let span = self.parsed.span(span);
        let classification = match classify_text(value, self.options) {
            Ok(()) => Classification::Simple {
                site,
                text: value.trim().to_string(),
            },
            Err(reason) => Classification::Skip(reason),
        };
        self.record(span, classification, Vec::new())
    }

    fn record_complex(&mut self, expr: &Expr) -> Option<usize> {
        let span = self.parsed.span(expr.span());
        let classification = Classification::Complex {
            site: SiteKind::Expression,
            source: self.file.slice(span).to_string(),
        };
        self.record(span, classification, free_identifiers(expr))
    }

    fn is_lookup_call(&self, callee: &Callee) -> bool {
        match callee {
            Callee::Expr(callee) => self.is_lookup_callee(callee),
            _ => false,
        }
    }

    fn is_lookup_callee(&self, callee: &Expr) -> bool {
        match callee {
            // t("key")
            Expr::Ident(ident) => self.options.lookup_functions.contains(ident.sym.as_str()),
            // i18n.t("key"), t.rich("key")
            Expr::Member(member) => {
                let prop_is_lookup = matches!(
                    &member.prop,
                    MemberProp::Ident(prop) if self.options.lookup_functions.contains(prop.sym.as_str())
                );
                let obj_is_lookup = matches!(
                    &*member.obj,
                    Expr::Ident(obj) if self.options.lookup_functions.contains(obj.sym.as_str())
                );
                prop_is_lookup || obj_is_lookup
            }
            _ => false,
        }
    }

    /// Classify the body of an expression container.
    ///
    /// Innermost shapes win: when a conditional has literal or dynamic
    /// branches, those branches are emitted and the conditional itself is
    /// not. Returns whether any shape (including a skip) was found; indices
    /// of emitted Complex candidates are appended to `complex`.
    fn classify_expr(&mut self, expr: &Expr, ctx: ExprContext, complex: &mut Vec<usize>) -> bool {
        match expr {
            Expr::Paren(paren) => self.classify_expr(&paren.expr, ctx, complex),
            Expr::TsAs(e) => self.classify_expr(&e.expr, ctx, complex),
            Expr::TsNonNull(e) => self.classify_expr(&e.expr, ctx, complex),
            Expr::TsSatisfies(e) => self.classify_expr(&e.expr, ctx, complex),
            Expr::TsConstAssertion(e) => self.classify_expr(&e.expr, ctx, complex),
            Expr::Lit(Lit::Str(s)) => {
                if let Some(value) = s.value.as_str() {
                    self.record_literal(s.span, value, SiteKind::ExprLiteral);
                }
                true
            }
            Expr::Tpl(tpl) if tpl.exprs.is_empty() => {
                if let Some(quasi) = tpl.quasis.first()
                    && let Some(cooked) = &quasi.cooked
                    && let Some(value) = cooked.as_str()
                {
                    self.record_literal(tpl.span, value, SiteKind::ExprLiteral);
                }
                true
            }
            Expr::Tpl(_) => self.classify_dynamic(expr, complex),
            Expr::Bin(bin) if bin.op == BinaryOp::Add && is_string_concat(expr) => {
                self.classify_dynamic(expr, complex)
            }
            Expr::Bin(bin) if bin.op == BinaryOp::LogicalAnd => {
                self.classify_expr(&bin.right, ctx, complex)
            }
            Expr::Bin(bin)
                if bin.op == BinaryOp::LogicalOr || bin.op == BinaryOp::NullishCoalescing =>
            {
                let left = self.classify_expr(&bin.left, ctx, complex);
                let right = self.classify_expr(&bin.right, ctx, complex);
                left || right
            }
            Expr::Cond(cond) => {
                let cons = self.classify_expr(&cond.cons, ctx, complex);
                let alt = self.classify_expr(&cond.alt, ctx, complex);
                if cons || alt {
                    let span = self.parsed.span(cond.span);
                    self.issues.push(
                        AmbiguousIssue {
                            location: self.location(span),
                            snippet: self.file.slice(span).to_string(),
                            reason: AmbiguityReason::InnerShapesWin,
                        }
                        .into(),
                    );
                    true
                } else if ctx == ExprContext::Children && !contains_jsx(expr) {
                    self.classify_dynamic(expr, complex)
                } else {
                    false
                }
            }
            Expr::Call(call) if self.is_lookup_call(&call.callee) => {
                let span = self.parsed.span(call.span);
                self.record(span, Classification::Skip(SkipReason::LookupCall), Vec::new());
                true
            }
            Expr::OptChain(chain)
                if matches!(&*chain.base, OptChainBase::Call(call) if self.is_lookup_callee(&call.callee)) =>
            {
                let span = self.parsed.span(chain.span);
                self.record(span, Classification::Skip(SkipReason::LookupCall), Vec::new());
                true
            }
            Expr::Call(_) | Expr::Member(_) | Expr::OptChain(_) => {
                if ctx == ExprContext::Children && !contains_jsx(expr) {
                    self.classify_dynamic(expr, complex)
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn classify_dynamic(&mut self, expr: &Expr, complex: &mut Vec<usize>) -> bool {
        if contains_jsx(expr) {
            return false;
        }
        if let Some(index) = self.record_complex(expr) {
            complex.push(index);
        }
        true
    }

    /// Classify a container's expression, then descend for nested markup.
    fn handle_container(&mut self, node: &JSXExprContainer, ctx: ExprContext) -> Vec<usize> {
        let mut complex = Vec::new();
        if let JSXExpr::Expr(expr) = &node.expr {
            self.classify_expr(expr, ctx, &mut complex);
        }
        node.visit_children_with(self);
        complex
    }

    fn handle_text(&mut self, node: &JSXText) -> Option<usize> {
        let raw = self.file.slice(self.parsed.span(node.span));
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let leading = raw.len() - raw.trim_start().len();
        let lo = node.span.lo + BytePos(leading as u32);
        let span = SwcSpan::new(lo, lo + BytePos(trimmed.len() as u32));
        // Entities are decoded in `value`; the raw span is what gets patched.
        let rendered = rendered_text(&node.value);
        self.record_literal(span, &rendered, SiteKind::JsxText)
    }

    /// Walk element children. Literal text sharing an element with a
    /// dynamic expression is marked ambiguous on both sides.
    fn handle_children(&mut self, parent: SwcSpan, children: &[JSXElementChild]) {
        let mut texts = Vec::new();
        let mut complex = Vec::new();

        for child in children {
            match child {
                JSXElementChild::JSXText(text) => {
                    if let Some(index) = self.handle_text(text) {
                        texts.push(index);
                    }
                }
                JSXElementChild::JSXExprContainer(container) => {
                    complex.extend(self.handle_container(container, ExprContext::Children));
                }
                other => other.visit_with(self),
            }
        }

        if !texts.is_empty() && !complex.is_empty() {
            for &index in texts.iter().chain(&complex) {
                self.found[index].ambiguous = true;
            }
            let span = self.parsed.span(parent);
            let first_line = self.file.line_of(span.lo);
            self.issues.push(
                AmbiguousIssue {
                    location: self.location(span),
                    snippet: self.file.line_text(first_line).trim().to_string(),
                    reason: AmbiguityReason::MixedChildren,
                }
                .into(),
            );
        }
    }
}

impl<'a> Visit for CandidateCollector<'a> {
    fn visit_jsx_element(&mut self, node: &JSXElement) {
        node.opening.visit_with(self);

        // <style> and <script> bodies are code, not prose
        let is_code = matches!(
            &node.opening.name,
            JSXElementName::Ident(ident) if ident.sym == "style" || ident.sym == "script"
        );
        if !is_code {
            self.handle_children(node.span, &node.children);
        }

        if let Some(closing) = &node.closing {
            closing.visit_with(self);
        }
    }

    fn visit_jsx_fragment(&mut self, node: &JSXFragment) {
        self.handle_children(node.span, &node.children);
    }

    fn visit_jsx_text(&mut self, node: &JSXText) {
        self.handle_text(node);
    }

    fn visit_jsx_expr_container(&mut self, node: &JSXExprContainer) {
        self.handle_container(node, ExprContext::Children);
    }

    fn visit_jsx_attr(&mut self, node: &JSXAttr) {
        let attr_name = match &node.name {
            JSXAttrName::Ident(ident) => ident.sym.to_string(),
            JSXAttrName::JSXNamespacedName(ns) => format!("{}-{}", ns.ns.sym, ns.name.sym),
        };
        let translatable = self.options.translatable_attributes.contains(&attr_name);

        match &node.value {
            Some(JSXAttrValue::Str(s)) => {
                if translatable && let Some(value) = s.value.as_str() {
                    self.record_literal(s.span, value, SiteKind::JsxAttr);
                }
            }
            Some(JSXAttrValue::JSXExprContainer(container)) => {
                if translatable {
                    self.handle_container(container, ExprContext::Attribute);
                } else {
                    // Render props can still hold markup.
                    container.visit_children_with(self);
                }
            }
            Some(value) => value.visit_with(self),
            None => {}
        }
    }
}

/// `"Hello, " + name` and friends: an addition chain with a string operand.
fn is_string_concat(expr: &Expr) -> bool {
    match expr {
        Expr::Bin(bin) if bin.op == BinaryOp::Add => {
            is_string_concat(&bin.left) || is_string_concat(&bin.right)
        }
        Expr::Lit(Lit::Str(_)) | Expr::Tpl(_) => true,
        Expr::Paren(paren) => is_string_concat(&paren.expr),
        _ => false,
    }
}

#[derive(Default)]
struct JsxFinder {
    found: bool,
}

impl Visit for JsxFinder {
    fn visit_jsx_element(&mut self, _node: &JSXElement) {
        self.found = true;
    }

    fn visit_jsx_fragment(&mut self, _node: &JSXFragment) {
        self.found = true;
    }
}

fn contains_jsx(expr: &Expr) -> bool {
    let mut finder = JsxFinder::default();
    expr.visit_with(&mut finder);
    finder.found
}

/// Text as React renders it: each line trimmed of spaces and tabs, blank
/// lines dropped, the rest joined by one space.
fn rendered_text(value: &str) -> String {
    value
        .lines()
        .map(|line| line.trim_matches([' ', '\t', '\r']))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
