use std::collections::{HashMap, HashSet, VecDeque};

use super::{DependencyIndex, Lookup, NodeId};
use crate::core::classify::StringCandidate;
use crate::core::source::FileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub node: NodeId,
    /// 1 for definitions the candidate reads directly.
    pub depth: usize,
}

/// What a Complex candidate's expression depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Reachable definitions, nearest first.
    pub dependencies: Vec<ResolvedDependency>,
    /// Names that could not be resolved, in order of first appearance.
    pub opaque: Vec<String>,
    /// Each cycle as the chain of names, ending where it started.
    pub cycles: Vec<Vec<String>>,
    /// Set when some definition was not followed because of the depth bound.
    pub depth_limited: bool,
}

/// Breadth-first walk from the candidate's free identifiers, bounded by
/// `max_depth`. Every node is expanded at most once, at its smallest depth.
/// An edge to an already reached node is not followed; when that node can
/// reach the edge's source through edges seen so far, the edge closes a
/// cycle and the cycle is reported.
pub fn resolve_dependencies(
    index: &DependencyIndex,
    candidate: &StringCandidate,
    max_depth: usize,
) -> Resolution {
    let mut walk = Walk {
        index,
        resolution: Resolution::default(),
        parent: HashMap::new(),
        edges: HashMap::new(),
        queue: VecDeque::new(),
    };

    for name in &candidate.identifiers {
        walk.visit_name(candidate.file, candidate.span.lo, name, None, 1, max_depth);
    }

    while let Some((id, depth)) = walk.queue.pop_front() {
        let node = index.node(id);
        for reference in &node.references {
            walk.visit_name(
                node.file,
                reference.span.lo,
                &reference.name,
                Some(id),
                depth + 1,
                max_depth,
            );
        }
    }

    let resolution = walk.resolution;
    tracing::debug!(
        candidate = %candidate.id,
        dependencies = resolution.dependencies.len(),
        opaque = resolution.opaque.len(),
        cycles = resolution.cycles.len(),
        "resolved dependencies"
    );
    resolution
}

struct Walk<'a> {
    index: &'a DependencyIndex,
    resolution: Resolution,
    /// Visited set; maps each reached node to the node it was reached from.
    parent: HashMap<NodeId, Option<NodeId>>,
    /// Edges between reached nodes, followed or not.
    edges: HashMap<NodeId, HashSet<NodeId>>,
    queue: VecDeque<(NodeId, usize)>,
}

impl Walk<'_> {
    fn visit_name(
        &mut self,
        file: FileId,
        offset: usize,
        name: &str,
        from: Option<NodeId>,
        depth: usize,
        max_depth: usize,
    ) {
        let ids = match self.index.lookup(file, offset, name) {
            Lookup::Found(ids) => ids,
            Lookup::Opaque => {
                if !self.resolution.opaque.iter().any(|n| n == name) {
                    self.resolution.opaque.push(name.to_string());
                }
                return;
            }
        };

        for id in ids {
            if self.parent.contains_key(&id) {
                if let Some(from) = from
                    && self.add_edge(from, id)
                    && let Some(cycle) = self.cycle_through(from, id)
                {
                    tracing::debug!(cycle = %cycle.join(" -> "), "dependency cycle");
                    self.resolution.cycles.push(cycle);
                }
                continue;
            }
            if depth > max_depth {
                self.resolution.depth_limited = true;
                continue;
            }
            if let Some(from) = from {
                self.add_edge(from, id);
            }
            self.parent.insert(id, from);
            self.resolution
                .dependencies
                .push(ResolvedDependency { node: id, depth });
            self.queue.push_back((id, depth));
        }
    }

    /// Record `from -> to`. False when the edge was already known.
    fn add_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        self.edges.entry(from).or_default().insert(to)
    }

    /// If `from` is reachable from `target`, the names along that path,
    /// closed by the edge back to `target`.
    fn cycle_through(&self, from: NodeId, target: NodeId) -> Option<Vec<String>> {
        let mut came_from: HashMap<NodeId, NodeId> = HashMap::new();
        let mut pending = VecDeque::from([target]);
        let mut found = target == from;
        while !found && let Some(current) = pending.pop_front() {
            let Some(next) = self.edges.get(&current) else {
                continue;
            };
            // Sorted so the reported path does not depend on hash order.
            let mut next: Vec<NodeId> = next.iter().copied().collect();
            next.sort();
            for id in next {
                if id == target || came_from.contains_key(&id) {
                    continue;
                }
                came_from.insert(id, current);
                if id == from {
                    found = true;
                    break;
                }
                pending.push_back(id);
            }
        }
        if !found {
            return None;
        }

        let mut chain = vec![from];
        let mut current = from;
        while current != target {
            current = *came_from.get(&current)?;
            chain.push(current);
        }
        let mut names: Vec<String> = chain
            .iter()
            .rev()
            .map(|id| self.index.node(*id).name.clone())
            .collect();
        names.push(self.index.node(target).name.clone());
        Some(names)
    }
}
