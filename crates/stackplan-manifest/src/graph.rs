//! Dependency graph management using `petgraph`.
//!
//! Nodes are stored in declaration order, so a node's index is its
//! declaration index. Edges point from a dependency to its dependent.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::fmt;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::dot::Dot;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use stackplan_common::error::{Result, StackplanError};
use stackplan_common::types::ReferenceKind;

use crate::parser::ast::Manifest;
use crate::resolver::Reference;

/// Why one resource must be created after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyEdge {
    /// Inferred from a property reference.
    Reference(ReferenceKind),
    /// Declared in `DependsOn`.
    Explicit,
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(ReferenceKind::Identity) => write!(f, "Ref"),
            Self::Reference(ReferenceKind::Attribute) => write!(f, "GetAtt"),
            Self::Explicit => write!(f, "DependsOn"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// A dependency graph of resources.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: Graph<String, DependencyEdge>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            nodes: HashMap::new(),
        }
    }

    /// Builds the graph for a manifest from its resolved references and
    /// explicit dependencies.
    ///
    /// A resource naming itself in `DependsOn` adds no edge; that case is a
    /// validation violation rather than a cycle.
    #[must_use]
    pub fn from_manifest(manifest: &Manifest, references: &[Reference]) -> Self {
        let mut graph = Self::new();
        for resource in &manifest.resources {
            let _ = graph.add_resource(&resource.name);
        }

        for reference in references {
            if let (Some(dependent), Some(dependency)) =
                (graph.node(&reference.source), graph.node(&reference.target))
            {
                graph.add_dependency(dependent, dependency, DependencyEdge::Reference(reference.kind));
            }
        }

        for resource in &manifest.resources {
            for dependency in &resource.depends_on {
                if *dependency == resource.name {
                    tracing::warn!(resource = %resource.name, "skipping explicit self dependency");
                    continue;
                }
                if let (Some(dependent), Some(dependency)) =
                    (graph.node(&resource.name), graph.node(dependency))
                {
                    graph.add_dependency(dependent, dependency, DependencyEdge::Explicit);
                }
            }
        }

        tracing::debug!(
            nodes = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            "built dependency graph"
        );
        graph
    }

    /// Adds a resource node. Insertion order is the tie-break order.
    pub fn add_resource(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        let idx = self.graph.add_node(name.clone());
        let _ = self.nodes.insert(name, idx);
        idx
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that a topological sort yields dependencies first.
    pub fn add_dependency(
        &mut self,
        dependent: NodeIndex,
        dependency: NodeIndex,
        edge: DependencyEdge,
    ) {
        let _ = self.graph.add_edge(dependency, dependent, edge);
    }

    /// Returns the node for a logical name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.nodes.get(name).copied()
    }

    /// Number of resources in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct dependencies of a resource, in declaration order.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let Some(node) = self.node(name) else {
            return Vec::new();
        };
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps.into_iter().map(|idx| self.graph[idx].clone()).collect()
    }

    /// Returns a creation order for all resources.
    ///
    /// Among resources whose dependencies are all placed, the one inserted
    /// first is placed next, so the order is fully determined by the input.
    ///
    /// # Errors
    ///
    /// Returns [`StackplanError::DependencyCycle`] with a shortest cycle if
    /// the graph is not acyclic.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        let count = self.graph.node_count();
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(count);
        while let Some(Reverse(i)) = ready.pop() {
            let node = NodeIndex::new(i);
            order.push(self.graph[node].clone());
            for edge in self.graph.edges(node) {
                let next = edge.target().index();
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() == count {
            Ok(order)
        } else {
            Err(StackplanError::DependencyCycle {
                cycle: self.minimal_cycle(),
            })
        }
    }

    /// Returns a deletion order: the reverse of [`Self::resolve_order`].
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn deletion_order(&self) -> Result<Vec<String>> {
        let mut order = self.resolve_order()?;
        order.reverse();
        Ok(order)
    }

    /// Renders the graph in Graphviz DOT format.
    #[must_use]
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.graph))
    }

    /// Finds a shortest cycle among the resources ordering could not place,
    /// returned in "depends on" order starting at its earliest-declared member.
    ///
    /// Only nodes in strongly connected components that contain a loop are
    /// searched. A component with one in-component successor per node is a
    /// single loop and is taken as is; other components are seeded by a
    /// depth-first search and then shortened by bounded breadth-first
    /// searches. Among equally short cycles, the one whose earliest member
    /// was declared first wins.
    fn minimal_cycle(&self) -> Vec<String> {
        let count = self.graph.node_count();
        let mut component: Vec<Option<usize>> = vec![None; count];
        let mut roots = Vec::new();
        for scc in tarjan_scc(&self.graph) {
            let looped = scc.len() > 1
                || scc
                    .first()
                    .is_some_and(|&n| self.graph.contains_edge(n, n));
            let Some(root) = scc.iter().map(|n| n.index()).min() else {
                continue;
            };
            if looped {
                for node in &scc {
                    component[node.index()] = Some(roots.len());
                }
                roots.push(root);
            }
        }

        let adjacency: Vec<Vec<usize>> = self
            .graph
            .node_indices()
            .map(|node| {
                let Some(id) = component[node.index()] else {
                    return Vec::new();
                };
                let mut next: Vec<usize> = self
                    .graph
                    .neighbors(node)
                    .map(|n| n.index())
                    .filter(|&n| component[n] == Some(id))
                    .collect();
                next.sort_unstable();
                next.dedup();
                next
            })
            .collect();

        let mut sizes = vec![0_usize; roots.len()];
        let mut edges = vec![0_usize; roots.len()];
        for (node, id) in component.iter().enumerate() {
            if let Some(id) = *id {
                sizes[id] += 1;
                edges[id] += adjacency[node].len();
            }
        }

        let mut marks = vec![Mark::Unvisited; count];
        let seeds: Vec<Vec<usize>> = roots
            .iter()
            .map(|&root| first_cycle(root, &adjacency, &mut marks).unwrap_or_default())
            .collect();
        let mut best = seeds
            .iter()
            .filter(|seed| !seed.is_empty())
            .min_by_key(|seed| seed.len())
            .cloned()
            .unwrap_or_default();

        let mut limit = best.len();
        let mut search = CycleSearch::new(&adjacency);
        for (start, id) in component.iter().enumerate() {
            if limit == 0 {
                break;
            }
            let Some(id) = *id else {
                continue;
            };
            if edges[id] == sizes[id] {
                if start == roots[id] && !seeds[id].is_empty() && seeds[id].len() <= limit {
                    best.clone_from(&seeds[id]);
                    limit = best.len() - 1;
                }
                continue;
            }
            if let Some(found) = search.shortest_through(start, limit) {
                limit = found.len() - 1;
                best = found;
            }
        }

        // Edges run dependency -> dependent; report the loop as "depends on".
        best.reverse();
        if let Some(pos) = best
            .iter()
            .enumerate()
            .min_by_key(|&(_, &n)| n)
            .map(|(i, _)| i)
        {
            best.rotate_left(pos);
        }
        best.into_iter()
            .map(|i| self.graph[NodeIndex::new(i)].clone())
            .collect()
    }
}

/// Depth-first search from `start` with an in-progress marker; returns the
/// first back-edge loop it meets.
///
/// The search keeps an explicit stack of `(node, next successor)` frames so
/// long chains do not grow the call stack.
fn first_cycle(start: usize, adjacency: &[Vec<usize>], marks: &mut [Mark]) -> Option<Vec<usize>> {
    if marks[start] != Mark::Unvisited {
        return None;
    }
    marks[start] = Mark::InProgress;
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

    while let Some(frame) = stack.last_mut() {
        let (node, cursor) = *frame;
        let Some(&next) = adjacency[node].get(cursor) else {
            marks[node] = Mark::Done;
            let _ = stack.pop();
            continue;
        };
        frame.1 += 1;
        match marks[next] {
            Mark::InProgress => {
                let from = stack.iter().position(|&(n, _)| n == next)?;
                return Some(stack[from..].iter().map(|&(n, _)| n).collect());
            }
            Mark::Unvisited => {
                marks[next] = Mark::InProgress;
                stack.push((next, 0));
            }
            Mark::Done => {}
        }
    }
    None
}

/// Breadth-first search state, indexed by node and reused across starts.
struct CycleSearch<'a> {
    adjacency: &'a [Vec<usize>],
    seen: Vec<usize>,
    parent: Vec<usize>,
    depth: Vec<usize>,
    generation: usize,
}

impl<'a> CycleSearch<'a> {
    fn new(adjacency: &'a [Vec<usize>]) -> Self {
        let count = adjacency.len();
        Self {
            adjacency,
            seen: vec![0; count],
            parent: vec![0; count],
            depth: vec![0; count],
            generation: 0,
        }
    }

    /// Finds a shortest cycle of at most `limit` nodes that passes through
    /// `start` and no node declared before it.
    fn shortest_through(&mut self, start: usize, limit: usize) -> Option<Vec<usize>> {
        let adjacency = self.adjacency;
        self.generation += 1;
        let generation = self.generation;
        self.seen[start] = generation;
        self.depth[start] = 1;
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            let len = self.depth[node];
            if len > limit {
                break;
            }
            for &next in &adjacency[node] {
                if next == start {
                    let mut path = vec![node];
                    let mut cursor = node;
                    while cursor != start {
                        cursor = self.parent[cursor];
                        path.push(cursor);
                    }
                    path.reverse();
                    return Some(path);
                }
                if next < start || len == limit || self.seen[next] == generation {
                    continue;
                }
                self.seen[next] = generation;
                self.depth[next] = len + 1;
                self.parent[next] = node;
                queue.push_back(next);
            }
        }
        None
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
