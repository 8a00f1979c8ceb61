//! Graphviz DOT export.
//!
//! [`DotExporter`] is a [`NodeVisitor`] that renders a subgraph as a DOT
//! digraph: one record per node (shape keyed by variant, attribute list in
//! the label) and one arrow per owning edge.  Feed the output to `dot -Tsvg`
//! or any Graphviz-compatible viewer.
//!
//! [`DotObserver`] is the push half: attached to a graph, it tracks a
//! revision counter so a render loop knows when a new snapshot is due.
//! Observers run inside the mutation's critical section and must not call
//! back into the graph, so the actual re-render happens pull-side via
//! [`render_dot`].

use std::collections::HashSet;

use atlas_graph::{GraphUpdate, NodeKind, NodeVisitor, UpdateObserver, WorldGraph};
use atlas_types::{NodeId, WorldError};
use tracing::debug;

/// Render the subgraph under `start` as a DOT digraph.
pub fn render_dot(graph: &WorldGraph, start: NodeId) -> Result<String, WorldError> {
    let mut exporter = DotExporter::new();
    graph.execute_traversal(&mut exporter, start)?;
    Ok(exporter.finish())
}

/// Visitor that accumulates DOT source while walking a subgraph.
pub struct DotExporter {
    nodes: String,
    edges: String,
    visited: HashSet<NodeId>,
}

impl DotExporter {
    pub fn new() -> Self {
        Self {
            nodes: String::new(),
            edges: String::new(),
            visited: HashSet::new(),
        }
    }

    /// The complete DOT document for everything visited so far.
    pub fn finish(self) -> String {
        format!(
            "digraph world {{\n  rankdir=TB;\n{}{}}}\n",
            self.nodes, self.edges
        )
    }

    fn shape_for(kind: &NodeKind) -> &'static str {
        match kind {
            NodeKind::Leaf => "ellipse",
            NodeKind::Group { .. } => "box",
            NodeKind::Transform { .. } => "diamond",
            NodeKind::UncertainTransform { .. } => "Mdiamond",
            NodeKind::Geometry { .. } => "hexagon",
        }
    }
}

impl Default for DotExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeVisitor for DotExporter {
    fn visit(&mut self, graph: &WorldGraph, id: NodeId) {
        if !self.visited.insert(id) {
            return;
        }
        let Some(node) = graph.node(id) else {
            return;
        };

        let mut label = format!("{id}");
        for attr in &node.attributes {
            // Quotes would break out of the DOT string literal.
            let pair = format!("\\n{}={}", attr.key, attr.value).replace('"', "'");
            label.push_str(&pair);
        }
        self.nodes.push_str(&format!(
            "  n{} [shape={}, label=\"{}\"];\n",
            id.get(),
            Self::shape_for(&node.kind),
            label
        ));

        if let Some(children) = node.children() {
            for &child in children {
                self.edges
                    .push_str(&format!("  n{} -> n{};\n", id.get(), child.get()));
                self.visit(graph, child);
            }
        }
    }
}

/// Observer that tracks how often the graph changed so a render loop knows
/// when to pull a fresh [`render_dot`] snapshot.
#[derive(Debug, Default)]
pub struct DotObserver {
    revision: u64,
    rendered: u64,
}

impl DotObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of applied mutations seen so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether an applied mutation arrived since the last
    /// [`mark_rendered`][DotObserver::mark_rendered].
    pub fn needs_render(&self) -> bool {
        self.revision > self.rendered
    }

    /// Record that the current revision has been rendered.
    pub fn mark_rendered(&mut self) {
        self.rendered = self.revision;
    }
}

impl UpdateObserver for DotObserver {
    fn receive_update(&mut self, update: &GraphUpdate) {
        // Rejected attempts change nothing worth re-rendering.
        if update.was_applied() {
            self.revision += 1;
            debug!(revision = self.revision, kind = update.kind(), "graph changed");
        }
    }
}
