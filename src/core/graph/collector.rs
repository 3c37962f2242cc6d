//! Per-file symbol collection: definitions, parameters, imports and
//! identifier reads. Runs in the parallel parse phase; the results are
//! merged into a [`DependencyIndex`](super::DependencyIndex) afterwards.

use swc_common::Span as SwcSpan;
use swc_ecma_ast::{
    ArrowExpr, AssignExpr, AssignOp, AssignTarget, BinaryOp, BindingIdent, BlockStmtOrExpr,
    DefaultDecl, ExportDecl, ExportDefaultDecl, ExportDefaultExpr, Expr, FnDecl, Function, Ident,
    ImportDecl, ImportSpecifier, JSXElementName, Lit, ModuleExportName, ObjectPatProp, Pat,
    ReturnStmt, SimpleAssignTarget, TsType, UnaryOp, VarDecl, VarDeclKind,
};
use swc_ecma_visit::{Visit, VisitWith};

use super::DependencyKind;
use crate::core::idents::free_identifier_spans;
use crate::core::parsers::jsx::ParsedModule;
use crate::core::source::Span;

/// An identifier read at a specific place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub span: Span,
}

/// Tracks import statements for cross-file resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub local_name: String,
    pub imported_name: String,
    pub module_path: String,
}

/// A definition found in one file, before it gets a global node id.
#[derive(Debug, Clone)]
pub struct LocalDefinition {
    pub name: String,
    pub span: Span,
    pub kind: DependencyKind,
    /// Span of the enclosing function, `None` at module level.
    pub scope: Option<Span>,
    pub references: Vec<Reference>,
    pub exported: bool,
}

/// A function parameter binding. Parameters shadow outer definitions and
/// are never resolvable themselves.
#[derive(Debug, Clone)]
pub struct ParamBinding {
    pub name: String,
    pub scope: Span,
}

/// Everything the graph needs to know about one file.
#[derive(Debug, Clone, Default)]
pub struct FileSymbols {
    pub definitions: Vec<LocalDefinition>,
    pub params: Vec<ParamBinding>,
    pub imports: Vec<ImportInfo>,
    /// Local name bound to `export default`, when it has one.
    pub default_export: Option<String>,
    /// Every identifier read in the file.
    pub references: Vec<Reference>,
}

pub fn collect_symbols(parsed: &ParsedModule) -> FileSymbols {
    let mut collector = SymbolCollector {
        parsed,
        scopes: Vec::new(),
        symbols: FileSymbols::default(),
    };
    parsed.module.visit_with(&mut collector);
    collector.symbols
}

struct SymbolCollector<'a> {
    parsed: &'a ParsedModule,
    /// Stack of enclosing function spans.
    scopes: Vec<Span>,
    symbols: FileSymbols,
}

impl<'a> SymbolCollector<'a> {
    fn current_scope(&self) -> Option<Span> {
        self.scopes.last().copied()
    }

    fn references_of<N>(&self, node: &N) -> Vec<Reference>
    where
        N: VisitWith<crate::core::idents::FreeIdentCollector>,
    {
        free_identifier_spans(node)
            .into_iter()
            .map(|(name, span)| Reference {
                name,
                span: self.parsed.span(span),
            })
            .collect()
    }

    fn define(&mut self, name: String, span: SwcSpan, kind: DependencyKind, references: Vec<Reference>) {
        tracing::trace!(%name, ?kind, "definition");
        self.symbols.definitions.push(LocalDefinition {
            name,
            span: self.parsed.span(span),
            kind,
            scope: self.current_scope(),
            references,
            exported: false,
        });
    }

    fn bind_params<'p>(&mut self, scope: SwcSpan, params: impl Iterator<Item = &'p Pat>) {
        let scope = self.parsed.span(scope);
        for pat in params {
            for name in binding_names(pat) {
                self.symbols.params.push(ParamBinding { name, scope });
            }
        }
    }

    fn check_var_decl(&mut self, node: &VarDecl) {
        let module_level = self.scopes.is_empty();
        for decl in &node.decls {
            let Some(init) = &decl.init else {
                continue;
            };
            // One declarator: the whole statement is the definition span.
            let span = if node.decls.len() == 1 {
                node.span
            } else {
                decl.span
            };

            match (&decl.name, unwrap_function(init)) {
                (Pat::Ident(binding), Some(function)) => {
                    if function.may_return_text() {
                        let references = match function {
                            FunctionLike::Arrow(arrow) => self.references_of(arrow),
                            FunctionLike::Function(f) => self.references_of(f),
                        };
                        self.define(
                            binding.id.sym.to_string(),
                            span,
                            DependencyKind::Function,
                            references,
                        );
                    }
                }
                (_, Some(_)) => {}
                (pat, None) => {
                    let kind = if module_level && node.kind == VarDeclKind::Const {
                        DependencyKind::Constant
                    } else if may_produce_text(init) {
                        DependencyKind::Variable
                    } else {
                        continue;
                    };
                    let references = self.references_of(&**init);
                    for name in binding_names(pat) {
                        self.define(name, span, kind, references.clone());
                    }
                }
            }
        }
    }
}

impl<'a> Visit for SymbolCollector<'a> {
    fn visit_ident(&mut self, node: &Ident) {
        self.symbols.references.push(Reference {
            name: node.sym.to_string(),
            span: self.parsed.span(node.span),
        });
    }

    fn visit_binding_ident(&mut self, _node: &BindingIdent) {}

    fn visit_ts_type(&mut self, _node: &TsType) {}

    fn visit_jsx_element_name(&mut self, _node: &JSXElementName) {}

    fn visit_fn_decl(&mut self, node: &FnDecl) {
        if may_return_text(&node.function) {
            let references = self.references_of(&*node.function);
            self.define(
                node.ident.sym.to_string(),
                node.function.span,
                DependencyKind::Function,
                references,
            );
        }
        node.function.visit_with(self);
    }

    fn visit_function(&mut self, node: &Function) {
        self.bind_params(node.span, node.params.iter().map(|p| &p.pat));
        self.scopes.push(self.parsed.span(node.span));
        node.visit_children_with(self);
        self.scopes.pop();
    }

    fn visit_arrow_expr(&mut self, node: &ArrowExpr) {
        self.bind_params(node.span, node.params.iter());
        self.scopes.push(self.parsed.span(node.span));
        node.visit_children_with(self);
        self.scopes.pop();
    }

    fn visit_var_decl(&mut self, node: &VarDecl) {
        self.check_var_decl(node);
        node.visit_children_with(self);
    }

    fn visit_assign_expr(&mut self, node: &AssignExpr) {
        if node.op == AssignOp::Assign
            && let AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) = &node.left
            && may_produce_text(&node.right)
        {
            let references = self.references_of(&*node.right);
            self.define(
                binding.id.sym.to_string(),
                node.span,
                DependencyKind::Variable,
                references,
            );
        }
        node.visit_children_with(self);
    }

    fn visit_export_decl(&mut self, node: &ExportDecl) {
        let before = self.symbols.definitions.len();
        node.visit_children_with(self);
        for def in &mut self.symbols.definitions[before..] {
            if def.scope.is_none() {
                def.exported = true;
            }
        }
    }

    fn visit_export_default_decl(&mut self, node: &ExportDefaultDecl) {
        if let DefaultDecl::Fn(fn_expr) = &node.decl
            && let Some(ident) = &fn_expr.ident
        {
            let name = ident.sym.to_string();
            if may_return_text(&fn_expr.function) {
                let references = self.references_of(&*fn_expr.function);
                self.define(
                    name.clone(),
                    fn_expr.function.span,
                    DependencyKind::Function,
                    references,
                );
                if let Some(def) = self.symbols.definitions.last_mut() {
                    def.exported = true;
                }
            }
            self.symbols.default_export = Some(name);
        }
        node.visit_children_with(self);
    }

    fn visit_export_default_expr(&mut self, node: &ExportDefaultExpr) {
        if let Expr::Ident(ident) = &*node.expr {
            self.symbols.default_export = Some(ident.sym.to_string());
        }
        node.visit_children_with(self);
    }

    fn visit_import_decl(&mut self, node: &ImportDecl) {
        let Some(module_path) = node.src.value.as_str() else {
            return;
        };
        for specifier in &node.specifiers {
            let info = match specifier {
                ImportSpecifier::Named(named) => {
                    let local_name = named.local.sym.to_string();
                    let imported_name = named
                        .imported
                        .as_ref()
                        .map(|i| match i {
                            ModuleExportName::Ident(ident) => ident.sym.to_string(),
                            ModuleExportName::Str(s) => s.value.to_string_lossy().to_string(),
                        })
                        .unwrap_or_else(|| local_name.clone());
                    ImportInfo {
                        local_name,
                        imported_name,
                        module_path: module_path.to_string(),
                    }
                }
                ImportSpecifier::Default(default) => ImportInfo {
                    local_name: default.local.sym.to_string(),
                    imported_name: "default".to_string(),
                    module_path: module_path.to_string(),
                },
                ImportSpecifier::Namespace(ns) => ImportInfo {
                    local_name: ns.local.sym.to_string(),
                    imported_name: "*".to_string(),
                    module_path: module_path.to_string(),
                },
            };
            self.symbols.imports.push(info);
        }
    }
}

enum FunctionLike<'a> {
    Arrow(&'a ArrowExpr),
    Function(&'a Function),
}

impl FunctionLike<'_> {
    fn may_return_text(&self) -> bool {
        match self {
            FunctionLike::Arrow(arrow) => match &*arrow.body {
                BlockStmtOrExpr::Expr(expr) => may_produce_text(expr),
                BlockStmtOrExpr::BlockStmt(block) => {
                    let mut finder = ReturnFinder::default();
                    block.visit_with(&mut finder);
                    finder.returns_text
                }
            },
            FunctionLike::Function(function) => may_return_text(function),
        }
    }
}

fn unwrap_function(expr: &Expr) -> Option<FunctionLike<'_>> {
    match expr {
        Expr::Arrow(arrow) => Some(FunctionLike::Arrow(arrow)),
        Expr::Fn(fn_expr) => Some(FunctionLike::Function(&fn_expr.function)),
        Expr::Paren(paren) => unwrap_function(&paren.expr),
        _ => None,
    }
}

fn may_return_text(function: &Function) -> bool {
    let mut finder = ReturnFinder::default();
    if let Some(body) = &function.body {
        body.visit_with(&mut finder);
    }
    finder.returns_text
}

/// Looks at the function's own return statements, not nested functions'.
#[derive(Default)]
struct ReturnFinder {
    returns_text: bool,
}

impl Visit for ReturnFinder {
    fn visit_return_stmt(&mut self, node: &ReturnStmt) {
        if let Some(arg) = &node.arg
            && may_produce_text(arg)
        {
            self.returns_text = true;
        }
    }

    fn visit_function(&mut self, _node: &Function) {}

    fn visit_arrow_expr(&mut self, _node: &ArrowExpr) {}
}

/// Whether an expression can evaluate to a string. Markup, numbers,
/// booleans, object and array literals and functions cannot; anything
/// opaque (identifiers, calls, member access) might.
fn may_produce_text(expr: &Expr) -> bool {
    match expr {
        Expr::Lit(Lit::Str(_)) | Expr::Tpl(_) | Expr::TaggedTpl(_) => true,
        Expr::Lit(_) => false,
        Expr::JSXElement(_) | Expr::JSXFragment(_) | Expr::JSXEmpty(_) => false,
        Expr::Arrow(_) | Expr::Fn(_) | Expr::Class(_) | Expr::Object(_) | Expr::Array(_) => false,
        Expr::Paren(paren) => may_produce_text(&paren.expr),
        Expr::TsAs(e) => may_produce_text(&e.expr),
        Expr::TsNonNull(e) => may_produce_text(&e.expr),
        Expr::TsSatisfies(e) => may_produce_text(&e.expr),
        Expr::TsConstAssertion(e) => may_produce_text(&e.expr),
        Expr::Await(e) => may_produce_text(&e.arg),
        Expr::Cond(cond) => may_produce_text(&cond.cons) || may_produce_text(&cond.alt),
        Expr::Bin(bin) => match bin.op {
            BinaryOp::Add | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing => {
                may_produce_text(&bin.left) || may_produce_text(&bin.right)
            }
            BinaryOp::LogicalAnd => may_produce_text(&bin.right),
            _ => false,
        },
        Expr::Unary(unary) => unary.op == UnaryOp::TypeOf,
        Expr::Update(_) => false,
        Expr::Assign(assign) => may_produce_text(&assign.right),
        _ => true,
    }
}

/// Names bound by a pattern, including destructured ones.
pub(crate) fn binding_names(pat: &Pat) -> Vec<String> {
    let mut names = Vec::new();
    push_binding_names(pat, &mut names);
    names
}

fn push_binding_names(pat: &Pat, names: &mut Vec<String>) {
    match pat {
        Pat::Ident(ident) => names.push(ident.id.sym.to_string()),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                push_binding_names(elem, names);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => push_binding_names(&kv.value, names),
                    ObjectPatProp::Assign(assign) => names.push(assign.key.id.sym.to_string()),
                    ObjectPatProp::Rest(rest) => push_binding_names(&rest.arg, names),
                }
            }
        }
        Pat::Rest(rest) => push_binding_names(&rest.arg, names),
        Pat::Assign(assign) => push_binding_names(&assign.left, names),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}
