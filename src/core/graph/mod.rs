//! Project-wide dependency index.
//!
//! Built once after every file has been parsed (a barrier), then shared
//! read-only by all resolution calls.
//!
//! - `collector`: per-file definitions, imports and references
//! - `resolve`: depth-bounded reachability walk for a candidate

mod collector;
mod resolve;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::source::{FileId, LineRange, SourceFile, Span};
use crate::utils::normalize_path;

pub(crate) use collector::binding_names;
pub use collector::{FileSymbols, ImportInfo, Reference, collect_symbols};
pub use resolve::{ResolvedDependency, Resolution, resolve_dependencies};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Function,
    Constant,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// A definition that text can depend on.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub name: String,
    pub file: FileId,
    /// The defining statement or function.
    pub span: Span,
    pub lines: LineRange,
    pub kind: DependencyKind,
    /// Identifiers the definition reads.
    pub references: Vec<Reference>,
    /// Places in the project where this definition is read.
    pub referenced_at: Vec<(FileId, Span)>,
    pub exported: bool,
    scope: Option<Span>,
}

/// Result of looking a name up from a given place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Vec<NodeId>),
    /// A parameter, an external import, or nothing known.
    Opaque,
}

struct FileEntry {
    path: PathBuf,
    by_name: HashMap<String, Vec<NodeId>>,
    params: Vec<collector::ParamBinding>,
    imports: Vec<ImportInfo>,
    default_export: Option<String>,
}

pub struct DependencyIndex {
    nodes: Vec<DependencyNode>,
    files: Vec<FileEntry>,
    by_path: HashMap<PathBuf, FileId>,
}

impl DependencyIndex {
    /// Merge per-file symbols into one index. `symbols[i]` belongs to
    /// `files[i]`; files that failed to parse contribute empty symbols.
    pub fn build(files: &[SourceFile], symbols: Vec<FileSymbols>) -> Self {
        let mut nodes = Vec::new();
        let mut entries = Vec::with_capacity(files.len());
        let mut all_references = Vec::with_capacity(files.len());

        for (file, symbols) in files.iter().zip(symbols) {
            let mut by_name: HashMap<String, Vec<NodeId>> = HashMap::new();
            for def in symbols.definitions {
                let id = NodeId(nodes.len());
                by_name.entry(def.name.clone()).or_default().push(id);
                nodes.push(DependencyNode {
                    lines: file.line_range(def.span),
                    name: def.name,
                    file: file.id,
                    span: def.span,
                    kind: def.kind,
                    references: def.references,
                    referenced_at: Vec::new(),
                    exported: def.exported,
                    scope: def.scope,
                });
            }
            entries.push(FileEntry {
                path: normalize_path(&file.path),
                by_name,
                params: symbols.params,
                imports: symbols.imports,
                default_export: symbols.default_export,
            });
            all_references.push(symbols.references);
        }

        let by_path = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.path.clone(), FileId(i)))
            .collect();

        let mut index = Self {
            nodes,
            files: entries,
            by_path,
        };

        let mut referenced_at: Vec<(NodeId, FileId, Span)> = Vec::new();
        for (i, references) in all_references.iter().enumerate() {
            for reference in references {
                if let Lookup::Found(ids) = index.lookup(FileId(i), reference.span.lo, &reference.name)
                {
                    referenced_at.extend(ids.into_iter().map(|id| (id, FileId(i), reference.span)));
                }
            }
        }
        for (id, file, span) in referenced_at {
            index.nodes[id.0].referenced_at.push((file, span));
        }

        tracing::info!(
            files = index.files.len(),
            definitions = index.nodes.len(),
            "dependency index built"
        );
        index
    }

    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    /// Resolve `name` as read at byte `offset` of `file`.
    ///
    /// Order: the innermost enclosing definition in the same file, then a
    /// relative import, then the first module-level definition in path
    /// order. Parameters and external imports are opaque.
    pub fn lookup(&self, file: FileId, offset: usize, name: &str) -> Lookup {
        let entry = &self.files[file.0];

        // Innermost scope containing the offset wins; module level is outermost.
        let mut best: Option<(usize, Vec<NodeId>)> = None;
        for &id in entry.by_name.get(name).map(Vec::as_slice).unwrap_or_default() {
            let depth = match self.nodes[id.0].scope {
                None => usize::MAX,
                Some(scope) if scope.lo <= offset && offset < scope.hi => scope.len(),
                Some(_) => continue,
            };
            match &mut best {
                Some((best_depth, ids)) if *best_depth == depth => ids.push(id),
                Some((best_depth, _)) if *best_depth < depth => {}
                _ => best = Some((depth, vec![id])),
            }
        }

        let param_depth = entry
            .params
            .iter()
            .filter(|p| p.name == name && p.scope.lo <= offset && offset < p.scope.hi)
            .map(|p| p.scope.len())
            .min();
        if let Some(param_depth) = param_depth
            && best.as_ref().is_none_or(|(depth, _)| param_depth < *depth)
        {
            return Lookup::Opaque;
        }

        if let Some((_, ids)) = best {
            return Lookup::Found(ids);
        }

        if let Some(import) = entry.imports.iter().find(|i| i.local_name == name) {
            return self.lookup_import(&entry.path, import);
        }

        self.files
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != file.0)
            .find_map(|(_, other)| {
                let ids = self.module_level(other, name);
                (!ids.is_empty()).then_some(ids)
            })
            .map_or(Lookup::Opaque, Lookup::Found)
    }

    fn lookup_import(&self, from: &Path, import: &ImportInfo) -> Lookup {
        let Some(target) = self.resolve_module(from, &import.module_path) else {
            return Lookup::Opaque;
        };
        let entry = &self.files[target.0];
        let name = match import.imported_name.as_str() {
            "*" => return Lookup::Opaque,
            "default" => match &entry.default_export {
                Some(name) => name.as_str(),
                None => return Lookup::Opaque,
            },
            name => name,
        };
        let ids = self.module_level(entry, name);
        if ids.is_empty() {
            Lookup::Opaque
        } else {
            Lookup::Found(ids)
        }
    }

    fn module_level(&self, entry: &FileEntry, name: &str) -> Vec<NodeId> {
        entry
            .by_name
            .get(name)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.nodes[id.0].scope.is_none())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolve a relative module specifier against the scanned file set.
    /// Bare specifiers (packages) never resolve.
    pub fn resolve_module(&self, from: &Path, import_path: &str) -> Option<FileId> {
        resolve_import_path(from, import_path)
            .into_iter()
            .find_map(|candidate| self.by_path.get(&candidate).copied())
    }
}

/// Candidate file paths for a relative import, most specific first.
pub fn resolve_import_path(current_file: &Path, import_path: &str) -> Vec<PathBuf> {
    if !import_path.starts_with('.') {
        return Vec::new();
    }
    let Some(base_dir) = current_file.parent() else {
        return Vec::new();
    };
    let resolved = normalize_path(&base_dir.join(import_path));

    let mut candidates = vec![resolved.clone()];
    for ext in ["ts", "tsx", "js", "jsx"] {
        let mut with_ext = resolved.clone().into_os_string();
        with_ext.push(format!(".{}", ext));
        candidates.push(PathBuf::from(with_ext));
    }
    for ext in ["ts", "tsx", "js", "jsx"] {
        candidates.push(resolved.join(format!("index.{}", ext)));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::parsers::jsx::parse_jsx_source;

    pub(crate) fn build_index(sources: &[(&str, &str)]) -> (Vec<SourceFile>, DependencyIndex) {
        let files: Vec<SourceFile> = sources
            .iter()
            .enumerate()
            .map(|(i, (path, code))| SourceFile::new(FileId(i), *path, code.to_string()))
            .collect();
        let symbols = files
            .iter()
            .map(|f| collect_symbols(&parse_jsx_source(&f.content, &f.path).unwrap()))
            .collect();
        let index = DependencyIndex::build(&files, symbols);
        (files, index)
    }

    fn names(index: &DependencyIndex, lookup: Lookup) -> Vec<(String, FileId)> {
        match lookup {
            Lookup::Found(ids) => ids
                .into_iter()
                .map(|id| (index.node(id).name.clone(), index.node(id).file))
                .collect(),
            Lookup::Opaque => Vec::new(),
        }
    }

    #[test]
    fn test_resolve_import_path_candidates() {
        let candidates = resolve_import_path(Path::new("src/app/page.tsx"), "../lib/format");
        assert_eq!(candidates[0], PathBuf::from("src/lib/format"));
        assert!(candidates.contains(&PathBuf::from("src/lib/format.ts")));
        assert!(candidates.contains(&PathBuf::from("src/lib/format/index.tsx")));
        assert!(resolve_import_path(Path::new("src/a.ts"), "react").is_empty());
    }

    #[test]
    fn test_same_file_wins_over_import_and_global() {
        let (_, index) = build_index(&[
            ("src/a.tsx", "const title = 'A';\nexport const App = () => <p>{title.trim()}</p>;"),
            ("src/b.ts", "export const title = 'B';"),
        ]);
        let offset = 30;
        assert_eq!(
            names(&index, index.lookup(FileId(0), offset, "title")),
            vec![("title".to_string(), FileId(0))]
        );
    }

    #[test]
    fn test_relative_import_is_followed() {
        let (_, index) = build_index(&[
            (
                "src/components/Hello.tsx",
                "import { greet as hello } from '../lib/greet';\nexport const Hello = () => <p>{hello()}</p>;",
            ),
            ("src/lib/greet.ts", "export function greet() { return 'hi'; }"),
            ("src/other/greet.ts", "export function hello() { return 'nope'; }"),
        ]);
        assert_eq!(
            names(&index, index.lookup(FileId(0), 60, "hello")),
            vec![("greet".to_string(), FileId(1))]
        );
    }

    #[test]
    fn test_default_import_follows_default_export() {
        let (_, index) = build_index(&[
            ("a.tsx", "import label from './label';"),
            ("label.ts", "const makeLabel = () => 'x';\nexport default makeLabel;"),
        ]);
        assert_eq!(
            names(&index, index.lookup(FileId(0), 0, "label")),
            vec![("makeLabel".to_string(), FileId(1))]
        );
    }

    #[test]
    fn test_external_import_is_opaque() {
        let (_, index) = build_index(&[
            ("a.tsx", "import { format } from 'date-fns';"),
            ("b.ts", "export function format() { return 'shadow'; }"),
        ]);
        assert_eq!(index.lookup(FileId(0), 0, "format"), Lookup::Opaque);
    }

    #[test]
    fn test_global_fallback_uses_path_order() {
        let (_, index) = build_index(&[
            ("a.tsx", "export const A = () => <p>{SITE_NAME}</p>;"),
            ("b.ts", "const SITE_NAME = 'B';"),
            ("c.ts", "const SITE_NAME = 'C';"),
        ]);
        assert_eq!(
            names(&index, index.lookup(FileId(0), 0, "SITE_NAME")),
            vec![("SITE_NAME".to_string(), FileId(1))]
        );
    }

    #[test]
    fn test_parameters_shadow_definitions() {
        let code = "const user = 'global';\nfunction greet(user) { return `Hi ${user}`; }";
        let (_, index) = build_index(&[("a.ts", code)]);
        let inside = code.find("`Hi").unwrap();
        assert_eq!(index.lookup(FileId(0), inside, "user"), Lookup::Opaque);
        assert_eq!(
            names(&index, index.lookup(FileId(0), 0, "user")),
            vec![("user".to_string(), FileId(0))]
        );
    }

    #[test]
    fn test_local_definition_scoped_to_function() {
        let code = "function A() { const label = 'a'; return label; }\nfunction B() { const label = 'b'; return label; }";
        let (files, index) = build_index(&[("a.ts", code)]);
        let in_b = code.rfind("return label").unwrap();
        let Lookup::Found(ids) = index.lookup(FileId(0), in_b, "label") else {
            panic!("label should resolve");
        };
        assert_eq!(ids.len(), 1);
        assert!(
            files[0]
                .slice(index.node(ids[0]).span)
                .starts_with("const label = 'b'")
        );
    }

    #[test]
    fn test_referenced_at_is_populated() {
        let (_, index) = build_index(&[
            ("a.tsx", "import { SITE } from './site';\nexport const A = () => <p>{SITE + '!'}</p>;"),
            ("site.ts", "export const SITE = 'Acme';"),
        ]);
        let site = index.nodes().iter().find(|n| n.name == "SITE").unwrap();
        assert_eq!(site.kind, DependencyKind::Constant);
        assert!(site.exported);
        assert_eq!(site.referenced_at.len(), 1);
        assert_eq!(site.referenced_at[0].0, FileId(0));
    }
}
