//! Graph traversal via visitors.
//!
//! Queries that walk a subgraph (attribute search, export, statistics) are
//! implemented as [`NodeVisitor`]s instead of growing the facade's surface:
//! the facade hands the visitor the start node
//! ([`WorldGraph::execute_traversal`][crate::WorldGraph::execute_traversal])
//! and the visitor drives the recursion itself through the shared accessors.
//! Because the graph is only borrowed shared during a traversal, a visitor
//! cannot mutate the graph it is walking.
//!
//! The ownership structure is a DAG: well-behaved visitors keep a visited
//! set so diamonds are processed once and a stray cycle cannot hang them.

use std::collections::HashSet;

use atlas_types::{Attribute, NodeId};

use crate::graph::WorldGraph;
use crate::node::NodeKind;

/// Traversal capability: called once per node the traversal reaches.
///
/// The visitor owns the traversal order; recurse by calling
/// [`visit`][NodeVisitor::visit] on child ids obtained from the graph.
pub trait NodeVisitor {
    fn visit(&mut self, graph: &WorldGraph, id: NodeId);
}

// ────────────────────────────────────────────────────────────────────────────
// AttributeFinder
// ────────────────────────────────────────────────────────────────────────────

/// Depth-first attribute search: collects the ids of every reachable node
/// whose attribute set is a superset of the query (AND over all entries).
///
/// Backs [`WorldGraph::list_nodes`][crate::WorldGraph::list_nodes].
pub struct AttributeFinder {
    query: Vec<Attribute>,
    matches: Vec<NodeId>,
    visited: HashSet<NodeId>,
}

impl AttributeFinder {
    /// A finder for the given query attributes.  An empty query matches
    /// every node.
    pub fn new(query: Vec<Attribute>) -> Self {
        Self {
            query,
            matches: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// The matching ids collected so far, in traversal order.
    pub fn matches(&self) -> &[NodeId] {
        &self.matches
    }

    /// Consume the finder, yielding the matching ids.
    pub fn into_matches(self) -> Vec<NodeId> {
        self.matches
    }
}

impl NodeVisitor for AttributeFinder {
    fn visit(&mut self, graph: &WorldGraph, id: NodeId) {
        if !self.visited.insert(id) {
            return;
        }
        let Some(node) = graph.node(id) else {
            return;
        };
        if node.matches(&self.query) {
            self.matches.push(id);
        }
        if let Some(children) = node.children() {
            for &child in children {
                self.visit(graph, child);
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// NodeTally
// ────────────────────────────────────────────────────────────────────────────

/// Subgraph statistics: node counts per kind plus the number of owning
/// edges, each reachable node counted exactly once.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub groups: usize,
    pub leaves: usize,
    pub transforms: usize,
    pub uncertain_transforms: usize,
    pub geometries: usize,
    pub edges: usize,
}

impl Tally {
    /// Total number of counted nodes.
    pub fn nodes(&self) -> usize {
        self.groups + self.leaves + self.transforms + self.uncertain_transforms + self.geometries
    }
}

/// Visitor producing a [`Tally`] of the traversed subgraph.
#[derive(Default)]
pub struct NodeTally {
    tally: Tally,
    visited: HashSet<NodeId>,
}

impl NodeTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected statistics.
    pub fn tally(&self) -> Tally {
        self.tally
    }
}

impl NodeVisitor for NodeTally {
    fn visit(&mut self, graph: &WorldGraph, id: NodeId) {
        if !self.visited.insert(id) {
            return;
        }
        let Some(node) = graph.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Leaf => self.tally.leaves += 1,
            NodeKind::Group { .. } => self.tally.groups += 1,
            NodeKind::Transform { .. } => self.tally.transforms += 1,
            NodeKind::UncertainTransform { .. } => self.tally.uncertain_transforms += 1,
            NodeKind::Geometry { .. } => self.tally.geometries += 1,
        }
        if let Some(children) = node.children() {
            self.tally.edges += children.len();
            for &child in children {
                self.visit(graph, child);
            }
        }
    }
}
