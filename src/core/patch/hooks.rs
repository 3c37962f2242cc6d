//! `useTranslation` wiring for rewritten components.
//!
//! The outline is taken while the file's AST is at hand; planning happens
//! later, once it is known which sites receive lookup patches.

use swc_ecma_ast::{
    ArrowExpr, BlockStmtOrExpr, Callee, Decl, DefaultDecl, ExportDefaultDecl, Expr, FnDecl,
    Function, ImportDecl, Lit, ModuleDecl, ModuleItem, Pat, Stmt, VarDeclarator,
};
use swc_ecma_visit::{Visit, VisitWith};

use super::{Patch, PatchKind};
use crate::core::classify::CandidateId;
use crate::core::graph::binding_names;
use crate::core::parsers::jsx::ParsedModule;
use crate::core::source::{SourceFile, Span};

pub const HOOK_IMPORT: &str = "import { useTranslation } from 'react-i18next';";
const HOOK_NAME: &str = "useTranslation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentBody {
    /// `{ ... }` body; `open` is the offset just after the brace.
    Block { open: usize, indent: String },
    /// Concise arrow body, to be wrapped in a block.
    Expr { span: Span, indent: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub span: Span,
    pub body: ComponentBody,
    /// Indentation of the line the component starts on.
    pub outer_indent: String,
    /// A lookup function binding is already in scope in the body.
    pub binds_lookup: bool,
}

/// Hook-related facts about one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookOutline {
    pub has_hook_import: bool,
    /// The lookup function is bound at module level.
    pub module_binds_lookup: bool,
    /// Where the import goes: after the last import or directive, else the
    /// start of the program.
    pub import_offset: usize,
    pub import_follows_statement: bool,
    pub components: Vec<Component>,
}

/// Patches wiring up the hook, and sites no hook can reach.
#[derive(Debug, Clone, Default)]
pub struct HookPlan {
    pub patches: Vec<Patch>,
    pub uncovered: Vec<CandidateId>,
}

pub fn outline_hooks(file: &SourceFile, parsed: &ParsedModule, lookup_fn: &str) -> HookOutline {
    let mut outline = HookOutline {
        import_offset: parsed.content_start(),
        ..Default::default()
    };

    let mut prologue = true;
    for item in &parsed.module.body {
        match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                prologue = false;
                outline.import_offset = statement_end(file, parsed.span(import.span).hi);
                outline.import_follows_statement = true;
                for local in import_locals(import) {
                    if local == HOOK_NAME {
                        outline.has_hook_import = true;
                    }
                    if local == lookup_fn {
                        outline.module_binds_lookup = true;
                    }
                }
            }
            ModuleItem::Stmt(Stmt::Expr(stmt))
                if prologue && matches!(&*stmt.expr, Expr::Lit(Lit::Str(_))) =>
            {
                // "use client" and friends must stay first.
                let end = statement_end(file, parsed.span(stmt.span).hi);
                if outline.import_offset < end {
                    outline.import_offset = end;
                    outline.import_follows_statement = true;
                }
            }
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => {
                prologue = false;
                if var
                    .decls
                    .iter()
                    .any(|d| binding_names(&d.name).iter().any(|n| n == lookup_fn))
                {
                    outline.module_binds_lookup = true;
                }
            }
            _ => prologue = false,
        }
    }

    let mut finder = ComponentFinder {
        file,
        parsed,
        lookup_fn,
        components: Vec::new(),
    };
    parsed.module.visit_with(&mut finder);
    outline.components = finder.components;
    outline
}

/// Plan hook insertion for the given lookup sites.
///
/// Each site is attributed to its innermost enclosing component. Components
/// without a lookup binding get a hook declaration; the file gets the import
/// when any hook is added and it is not imported yet. Sites outside every
/// component, in a file without a module-level binding, are uncovered.
pub fn plan_hooks(
    file: &SourceFile,
    outline: &HookOutline,
    sites: &[(CandidateId, Span)],
    lookup_fn: &str,
) -> HookPlan {
    let mut plan = HookPlan::default();
    let mut needs_hook: Vec<usize> = Vec::new();

    for (candidate, span) in sites {
        let owner = outline
            .components
            .iter()
            .enumerate()
            .filter(|(_, c)| c.span.contains(*span))
            .min_by_key(|(_, c)| c.span.len());
        match owner {
            Some((i, component)) => {
                if !component.binds_lookup && !outline.module_binds_lookup && !needs_hook.contains(&i)
                {
                    needs_hook.push(i);
                }
            }
            None if outline.module_binds_lookup => {}
            None => {
                tracing::debug!(candidate = %candidate, "site outside any component");
                plan.uncovered.push(*candidate);
            }
        }
    }

    if needs_hook.is_empty() {
        return plan;
    }

    let declaration = hook_declaration(lookup_fn);
    for i in needs_hook {
        let component = &outline.components[i];
        match &component.body {
            ComponentBody::Block { open, indent } => {
                plan.patches.push(Patch::insertion(
                    file.id,
                    *open,
                    format!("\n{}{}", indent, declaration),
                    PatchKind::Hook,
                ));
            }
            ComponentBody::Expr { span, indent } => {
                plan.patches.push(Patch::insertion(
                    file.id,
                    span.lo,
                    format!("{{\n{indent}{declaration}\n{indent}return "),
                    PatchKind::Hook,
                ));
                plan.patches.push(Patch::insertion(
                    file.id,
                    span.hi,
                    format!(";\n{}}}", component.outer_indent),
                    PatchKind::Hook,
                ));
            }
        }
    }

    if !outline.has_hook_import {
        let text = if outline.import_follows_statement {
            format!("\n{}", HOOK_IMPORT)
        } else {
            format!("{}\n", HOOK_IMPORT)
        };
        plan.patches
            .push(Patch::insertion(file.id, outline.import_offset, text, PatchKind::Import));
    }
    plan
}

fn hook_declaration(lookup_fn: &str) -> String {
    if lookup_fn == "t" {
        format!("const {{ t }} = {}();", HOOK_NAME)
    } else {
        format!("const {{ t: {} }} = {}();", lookup_fn, HOOK_NAME)
    }
}

fn import_locals(import: &ImportDecl) -> impl Iterator<Item = String> + '_ {
    import.specifiers.iter().map(|s| match s {
        swc_ecma_ast::ImportSpecifier::Named(named) => named.local.sym.to_string(),
        swc_ecma_ast::ImportSpecifier::Default(default) => default.local.sym.to_string(),
        swc_ecma_ast::ImportSpecifier::Namespace(ns) => ns.local.sym.to_string(),
    })
}

/// Include a trailing semicolon the statement span may have left out.
fn statement_end(file: &SourceFile, hi: usize) -> usize {
    if file.content[hi..].starts_with(';') {
        hi + 1
    } else {
        hi
    }
}

fn indent_of_line(file: &SourceFile, offset: usize) -> String {
    file.line_text(file.line_of(offset))
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

struct ComponentFinder<'a> {
    file: &'a SourceFile,
    parsed: &'a ParsedModule,
    lookup_fn: &'a str,
    components: Vec<Component>,
}

impl ComponentFinder<'_> {
    fn body_binds_lookup(&self, stmts: &[Stmt]) -> bool {
        stmts.iter().any(|stmt| match stmt {
            Stmt::Decl(Decl::Var(var)) => var
                .decls
                .iter()
                .any(|d| binding_names(&d.name).iter().any(|n| n == self.lookup_fn)),
            _ => false,
        })
    }

    fn params_bind_lookup<'p>(&self, params: impl Iterator<Item = &'p Pat>) -> bool {
        params
            .flat_map(binding_names)
            .any(|name| name == self.lookup_fn)
    }

    fn record_function(&mut self, name: String, function: &Function) {
        let Some(body) = &function.body else {
            return;
        };
        let span = self.parsed.span(function.span);
        let outer_indent = indent_of_line(self.file, span.lo);
        let open = self.parsed.span(body.span).lo + 1;
        let indent = match body.stmts.first() {
            Some(first) => indent_of_line(self.file, self.parsed.span(swc_common::Spanned::span(first)).lo),
            None => format!("{}  ", outer_indent),
        };
        let binds_lookup = self.params_bind_lookup(function.params.iter().map(|p| &p.pat))
            || self.body_binds_lookup(&body.stmts);
        self.components.push(Component {
            name,
            span,
            body: ComponentBody::Block { open, indent },
            outer_indent,
            binds_lookup,
        });
    }

    fn record_arrow(&mut self, name: String, arrow: &ArrowExpr) {
        let span = self.parsed.span(arrow.span);
        let outer_indent = indent_of_line(self.file, span.lo);
        let params_bind = self.params_bind_lookup(arrow.params.iter());
        let (body, binds_lookup) = match &*arrow.body {
            BlockStmtOrExpr::BlockStmt(block) => {
                let indent = match block.stmts.first() {
                    Some(first) => indent_of_line(
                        self.file,
                        self.parsed.span(swc_common::Spanned::span(first)).lo,
                    ),
                    None => format!("{}  ", outer_indent),
                };
                (
                    ComponentBody::Block {
                        open: self.parsed.span(block.span).lo + 1,
                        indent,
                    },
                    params_bind || self.body_binds_lookup(&block.stmts),
                )
            }
            BlockStmtOrExpr::Expr(expr) => (
                ComponentBody::Expr {
                    span: self.parsed.span(swc_common::Spanned::span(&**expr)),
                    indent: format!("{}  ", outer_indent),
                },
                params_bind,
            ),
        };
        self.components.push(Component {
            name,
            span,
            body,
            outer_indent,
            binds_lookup,
        });
    }

    /// Record `init` when it is a function, possibly wrapped in a call such
    /// as `memo(...)` or `forwardRef(...)`.
    fn record_init(&mut self, name: String, init: &Expr) {
        match init {
            Expr::Arrow(arrow) => self.record_arrow(name, arrow),
            Expr::Fn(fn_expr) => self.record_function(name, &fn_expr.function),
            Expr::Paren(paren) => self.record_init(name, &paren.expr),
            Expr::Call(call) if matches!(call.callee, Callee::Expr(_)) => {
                if let Some(first) = call.args.first() {
                    self.record_init(name, &first.expr);
                }
            }
            _ => {}
        }
    }
}

impl Visit for ComponentFinder<'_> {
    fn visit_fn_decl(&mut self, node: &FnDecl) {
        let name = node.ident.sym.to_string();
        if is_component_name(&name) {
            self.record_function(name, &node.function);
        }
        node.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        if let Pat::Ident(binding) = &node.name
            && is_component_name(&binding.id.sym)
            && let Some(init) = &node.init
        {
            self.record_init(binding.id.sym.to_string(), init);
        }
        node.visit_children_with(self);
    }

    fn visit_export_default_decl(&mut self, node: &ExportDefaultDecl) {
        if let DefaultDecl::Fn(fn_expr) = &node.decl {
            let name = fn_expr
                .ident
                .as_ref()
                .map(|i| i.sym.to_string())
                .unwrap_or_else(|| "default".to_string());
            if fn_expr.ident.is_none() || is_component_name(&name) {
                self.record_function(name, &fn_expr.function);
            }
        }
        node.visit_children_with(self);
    }
}
