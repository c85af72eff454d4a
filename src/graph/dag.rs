//! Name-keyed dependency DAG.
//!
//! Wraps a petgraph [`StableDiGraph`] with name↔index maps. Vertices are
//! node names or virtual-input names; edges point from a dependency to
//! the vertex that depends on it. Every vertex records an insertion
//! sequence number so topological order can break ties deterministically:
//! two runs over structurally equal pipelines visit vertices in the same
//! order, and vertices added earlier sort first among the ready set.
//!
//! Acyclicity is not enforced here; callers check reachability with
//! [`DependencyDag::reaches`] before committing edges.

use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
struct Vertex {
    name: String,
    seq: u64,
}

/// Adjacency DAG over vertex names with deterministic iteration order.
#[derive(Debug, Clone, Default)]
pub(crate) struct DependencyDag {
    graph: StableDiGraph<Vertex, ()>,
    indices: FxHashMap<String, NodeIndex>,
    next_seq: u64,
}

impl DependencyDag {
    /// Insert a vertex, returning its index. Idempotent for existing names.
    pub(crate) fn insert(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.indices.get(name) {
            return idx;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let idx = self.graph.add_node(Vertex {
            name: name.to_string(),
            seq,
        });
        self.indices.insert(name.to_string(), idx);
        idx
    }

    /// Remove a vertex and all its edges. No-op for unknown names.
    pub(crate) fn remove(&mut self, name: &str) {
        if let Some(idx) = self.indices.remove(name) {
            self.graph.remove_node(idx);
        }
    }

    /// Add an edge `from → to`. Both vertices must exist; duplicate edges
    /// collapse to one.
    pub(crate) fn add_edge(&mut self, from: &str, to: &str) {
        if let (Some(&a), Some(&b)) = (self.indices.get(from), self.indices.get(to)) {
            self.graph.update_edge(a, b, ());
        }
    }

    /// Remove every incoming edge of `name`.
    pub(crate) fn remove_incoming_edges(&mut self, name: &str) {
        let Some(&idx) = self.indices.get(name) else {
            return;
        };
        let predecessors: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        for pred in predecessors {
            if let Some(edge) = self.graph.find_edge(pred, idx) {
                self.graph.remove_edge(edge);
            }
        }
    }

    /// Whether a path `from → … → to` exists. Trivially true for
    /// `from == to` when the vertex exists.
    pub(crate) fn reaches(&self, from: &str, to: &str) -> bool {
        let (Some(&a), Some(&b)) = (self.indices.get(from), self.indices.get(to)) else {
            return false;
        };
        has_path_connecting(&self.graph, a, b, None)
    }

    /// Direct dependencies (incoming neighbors), ordered by insertion.
    pub(crate) fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Direct dependents (outgoing neighbors), ordered by insertion.
    pub(crate) fn dependents_of(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, dir: Direction) -> Vec<String> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut found: Vec<&Vertex> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| &self.graph[n])
            .collect();
        found.sort_by_key(|v| v.seq);
        found.into_iter().map(|v| v.name.clone()).collect()
    }

    /// Number of dependents of `name`.
    pub(crate) fn out_degree(&self, name: &str) -> usize {
        match self.indices.get(name) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .count(),
            None => 0,
        }
    }

    /// All vertices from which `name` is reachable (transitive
    /// dependencies, excluding `name` itself).
    pub(crate) fn ancestors(&self, name: &str) -> FxHashSet<String> {
        let mut seen = FxHashSet::default();
        let Some(&start) = self.indices.get(name) else {
            return seen;
        };
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            for pred in self.graph.neighbors_directed(idx, Direction::Incoming) {
                if seen.insert(self.graph[pred].name.clone()) {
                    stack.push(pred);
                }
            }
        }
        seen
    }

    /// Vertices with no dependents, ordered by insertion.
    pub(crate) fn leaves(&self) -> Vec<String> {
        let mut found: Vec<&Vertex> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|idx| &self.graph[idx])
            .collect();
        found.sort_by_key(|v| v.seq);
        found.into_iter().map(|v| v.name.clone()).collect()
    }

    /// Every vertex name in topological order. Among simultaneously ready
    /// vertices, the one inserted first comes first (Kahn sweep over a
    /// min-heap of insertion sequences).
    pub(crate) fn topo_order(&self) -> Vec<String> {
        let mut in_degree: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut ready: BinaryHeap<Reverse<(u64, NodeIndex)>> = BinaryHeap::new();

        for idx in self.graph.node_indices() {
            let degree = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .count();
            in_degree.insert(idx, degree);
            if degree == 0 {
                ready.push(Reverse((self.graph[idx].seq, idx)));
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, idx))) = ready.pop() {
            order.push(self.graph[idx].name.clone());
            for succ in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.graph[succ].seq, succ)));
                    }
                }
            }
        }

        debug_assert_eq!(order.len(), self.graph.node_count());
        order
    }

    /// All edges as `(from, to)` name pairs in a deterministic order.
    pub(crate) fn edges(&self) -> Vec<(String, String)> {
        let mut found: Vec<(u64, u64, String, String)> = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(a, b)| {
                let from = &self.graph[a];
                let to = &self.graph[b];
                (from.seq, to.seq, from.name.clone(), to.name.clone())
            })
            .collect();
        found.sort_by_key(|(a, b, _, _)| (*a, *b));
        found.into_iter().map(|(_, _, f, t)| (f, t)).collect()
    }
}
