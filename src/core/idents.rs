//! Free identifier collection for expressions and function bodies.

use std::collections::HashSet;

use swc_common::Span;
use swc_ecma_ast::{
    BindingIdent, ClassDecl, FnDecl, FnExpr, Ident, JSXElementName, JSXMemberExpr, JSXObject,
    TsType,
};
use swc_ecma_visit::{Visit, VisitWith};

/// Collects identifiers read by a node that are not bound inside it.
///
/// Binding is tracked per node, not per scope: a name bound anywhere inside
/// the node is treated as bound everywhere in it. Type annotations and JSX
/// tag names are ignored.
#[derive(Default)]
pub struct FreeIdentCollector {
    seen: Vec<(String, Span)>,
    bound: HashSet<String>,
}

impl FreeIdentCollector {
    fn finish(self) -> Vec<(String, Span)> {
        let bound = self.bound;
        let mut unique = HashSet::new();
        self.seen
            .into_iter()
            .filter(|(name, _)| !bound.contains(name) && unique.insert(name.clone()))
            .collect()
    }
}

impl Visit for FreeIdentCollector {
    fn visit_ident(&mut self, node: &Ident) {
        self.seen.push((node.sym.to_string(), node.span));
    }

    fn visit_binding_ident(&mut self, node: &BindingIdent) {
        self.bound.insert(node.id.sym.to_string());
    }

    fn visit_fn_decl(&mut self, node: &FnDecl) {
        self.bound.insert(node.ident.sym.to_string());
        node.function.visit_with(self);
    }

    fn visit_fn_expr(&mut self, node: &FnExpr) {
        if let Some(ident) = &node.ident {
            self.bound.insert(ident.sym.to_string());
        }
        node.function.visit_with(self);
    }

    fn visit_class_decl(&mut self, node: &ClassDecl) {
        self.bound.insert(node.ident.sym.to_string());
        node.class.visit_with(self);
    }

    fn visit_ts_type(&mut self, _node: &TsType) {}

    fn visit_jsx_element_name(&mut self, _node: &JSXElementName) {}

    fn visit_jsx_member_expr(&mut self, _node: &JSXMemberExpr) {}

    fn visit_jsx_object(&mut self, _node: &JSXObject) {}
}

/// Free identifiers of `node`, deduplicated, in order of first appearance.
pub fn free_identifiers<N>(node: &N) -> Vec<String>
where
    N: VisitWith<FreeIdentCollector>,
{
    free_identifier_spans(node)
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

/// Like [`free_identifiers`], keeping the span of each first occurrence.
pub fn free_identifier_spans<N>(node: &N) -> Vec<(String, Span)>
where
    N: VisitWith<FreeIdentCollector>,
{
    let mut collector = FreeIdentCollector::default();
    node.visit_with(&mut collector);
    collector.finish()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use swc_ecma_ast::{Decl, ModuleItem, Stmt};

    use super::*;
    use crate::core::parsers::jsx::parse_jsx_source;

    fn idents_of_first_init(code: &str) -> Vec<String> {
        let parsed = parse_jsx_source(code, Path::new("test.tsx")).unwrap();
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = &parsed.module.body[0] else {
            panic!("expected a variable declaration");
        };
        free_identifiers(var.decls[0].init.as_deref().unwrap())
    }

    #[test]
    fn test_member_props_are_not_identifiers() {
        assert_eq!(
            idents_of_first_init("const x = user.profile.name;"),
            vec!["user"]
        );
    }

    #[test]
    fn test_call_arguments_and_callee() {
        assert_eq!(
            idents_of_first_init("const x = formatName(user, locale, user);"),
            vec!["formatName", "user", "locale"]
        );
    }

    #[test]
    fn test_arrow_params_are_bound() {
        assert_eq!(
            idents_of_first_init("const x = items.map((item) => prefix + item.label);"),
            vec!["items", "prefix"]
        );
    }

    #[test]
    fn test_shorthand_props_and_templates() {
        assert_eq!(
            idents_of_first_init("const x = build({ count }, `${greeting}, ${name}`);"),
            vec!["build", "count", "greeting", "name"]
        );
    }

    #[test]
    fn test_types_are_ignored() {
        assert_eq!(
            idents_of_first_init("const x = (value as Label).text;"),
            vec!["value"]
        );
    }
}
