//! [`WorldGraph`] – the world-model facade.
//!
//! Owns the node arena (which doubles as the id lookup table), the root
//! group, the id generator and the observer list.  All structural invariants
//! are enforced here:
//!
//! - id uniqueness and non-aliasing across the changing DAG;
//! - nodes are freed exactly when their last owning group slot is severed
//!   (the root is permanent);
//! - transform chains are queried consistently against time order;
//! - every attached observer sees every attempted mutation, in attachment
//!   order, with the outcome.
//!
//! Every mutation follows the same three-phase protocol: resolve the
//! involved ids, validate structural preconditions and id availability, then
//! commit or reject – no partially applied state is ever observable – and
//! finally notify the observers.
//!
//! # Concurrency
//!
//! Mutations take `&mut self`, so exclusive access is the type system's
//! single-writer lock; share a graph between threads by wrapping it in a
//! mutex or confining it to one coordinating task.  Observer callbacks run
//! synchronously inside the mutation.  Visitors take `&self` and therefore
//! cannot re-enter mutations.

use std::collections::{HashMap, HashSet, VecDeque};

use atlas_types::geometry::{Pose, PoseCovariance, Shape};
use atlas_types::{Attribute, NodeId, TimeStamp, WorldError};
use tracing::{debug, error, warn};

use crate::id_generator::{IdGenerator, SequentialIdGenerator};
use crate::node::{Node, NodeKind};
use crate::observer::{GraphUpdate, ObserverId, UpdateObserver};
use crate::visitor::{AttributeFinder, NodeVisitor};

/// The central handle to create and maintain a robot world model.
///
/// Components address nodes exclusively by [`NodeId`]; no node references
/// cross this boundary.  See the [module docs](self) for the invariants and
/// the concurrency model.
pub struct WorldGraph {
    /// Arena and authoritative id lookup table in one: every live node,
    /// keyed by its id.
    nodes: HashMap<NodeId, Node>,
    ids: Box<dyn IdGenerator>,
    root: NodeId,
    observers: Vec<(ObserverId, Box<dyn UpdateObserver>)>,
    next_observer: u64,
}

impl WorldGraph {
    /// Create a graph with the default sequential id generator.  The root
    /// group is created immediately and lives as long as the graph.
    pub fn new() -> Self {
        Self::with_id_generator(Box::new(SequentialIdGenerator::new()))
    }

    /// Create a graph with a caller-provided id generator.
    pub fn with_id_generator(ids: Box<dyn IdGenerator>) -> Self {
        let root = ids.root_id();
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new(root, Vec::new(), NodeKind::empty_group()));
        Self {
            nodes,
            ids,
            root,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Queries
    // ────────────────────────────────────────────────────────────────────────

    /// The fixed id of the root group.
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Whether `id` resolves to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Shared access to a node, for visitors and exporters.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let node = self.nodes.get(&id);
        if let Some(node) = node {
            // A table entry disagreeing with its node means the arena is
            // corrupted, not that the caller made a mistake.
            debug_assert_eq!(node.id, id, "lookup table corruption at id {id}");
        }
        node
    }

    /// Ids of all nodes reachable from the root whose attribute set is a
    /// superset of `filter` (AND over all filter entries).  Order is
    /// traversal order, nothing more.
    pub fn list_nodes(&self, filter: &[Attribute]) -> Vec<NodeId> {
        debug!(live_nodes = self.nodes.len(), "attribute search");
        let mut finder = AttributeFinder::new(filter.to_vec());
        finder.visit(self, self.root);
        finder.into_matches()
    }

    /// The attributes of `id`.
    pub fn attributes(&self, id: NodeId) -> Result<Vec<Attribute>, WorldError> {
        self.node(id)
            .map(|n| n.attributes.clone())
            .ok_or(WorldError::NotFound(id))
    }

    /// The ids of every group currently holding `id` as a child.
    pub fn parents(&self, id: NodeId) -> Result<Vec<NodeId>, WorldError> {
        self.node(id)
            .map(|n| n.parents.clone())
            .ok_or(WorldError::NotFound(id))
    }

    /// The ordered child ids of the group `id`.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, WorldError> {
        let node = self.node(id).ok_or(WorldError::NotFound(id))?;
        match node.children() {
            Some(children) => Ok(children.to_vec()),
            None => {
                error!(%id, "node is not a group, cannot return child ids");
                Err(WorldError::WrongKind {
                    id,
                    expected: "group",
                })
            }
        }
    }

    /// The pose of the transform node `id`, taken as the most recent sample
    /// at or before `at`.  Accepts both plain and uncertain transforms.
    pub fn transform(&self, id: NodeId, at: TimeStamp) -> Result<Pose, WorldError> {
        let node = self.node(id).ok_or(WorldError::NotFound(id))?;
        match &node.kind {
            NodeKind::Transform { history, .. } => history.sample_at(at).ok_or(WorldError::NoData(id)),
            NodeKind::UncertainTransform { history, .. } => {
                history.pose_at(at).ok_or(WorldError::NoData(id))
            }
            _ => {
                error!(%id, "node is not a transform, cannot return pose data");
                Err(WorldError::WrongKind {
                    id,
                    expected: "transform",
                })
            }
        }
    }

    /// The (pose, covariance) pair of the uncertain transform `id` at or
    /// before `at`.
    pub fn uncertain_transform(
        &self,
        id: NodeId,
        at: TimeStamp,
    ) -> Result<(Pose, PoseCovariance), WorldError> {
        let node = self.node(id).ok_or(WorldError::NotFound(id))?;
        match &node.kind {
            NodeKind::UncertainTransform { history, .. } => history
                .sample_at(at)
                .map(|s| (s.pose, s.covariance))
                .ok_or(WorldError::NoData(id)),
            _ => {
                error!(%id, "node is not an uncertain transform, cannot return pose data");
                Err(WorldError::WrongKind {
                    id,
                    expected: "uncertain transform",
                })
            }
        }
    }

    /// The shape payload and stamp of the geometry node `id`.
    pub fn geometry(&self, id: NodeId) -> Result<(Shape, TimeStamp), WorldError> {
        let node = self.node(id).ok_or(WorldError::NotFound(id))?;
        match &node.kind {
            NodeKind::Geometry { shape, stamp } => Ok((shape.clone(), *stamp)),
            _ => {
                error!(%id, "node is not a geometric node, cannot return shape data");
                Err(WorldError::WrongKind {
                    id,
                    expected: "geometric node",
                })
            }
        }
    }

    /// The composed pose of `target` relative to `reference` at `at`.
    ///
    /// Walks the ownership DAG from `reference` towards `target` over child
    /// edges (breadth-first, shortest chain).  Every transform node entered
    /// contributes its sample at `at`; groups, leaves and geometry contribute
    /// identity.  Composition is parent-then-child: for a chain
    /// root→A(Ta)→B(Tb), the pose of B relative to root is Ta·Tb.
    ///
    /// # Errors
    ///
    /// [`WorldError::Disconnected`] when no ownership path exists,
    /// [`WorldError::NoData`] when the transform that would complete the
    /// chain has no sample at or before `at`.
    pub fn transform_between(
        &self,
        target: NodeId,
        reference: NodeId,
        at: TimeStamp,
    ) -> Result<Pose, WorldError> {
        if !self.contains(target) {
            return Err(WorldError::NotFound(target));
        }
        if !self.contains(reference) {
            return Err(WorldError::NotFound(reference));
        }
        if target == reference {
            return Ok(Pose::identity());
        }

        // BFS over child edges; each queue entry carries the pose composed
        // from `reference` down to that node.
        let mut queue: VecDeque<(NodeId, Pose)> = VecDeque::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        queue.push_back((reference, Pose::identity()));
        visited.insert(reference);

        while let Some((current, accumulated)) = queue.pop_front() {
            let Some(children) = self.node(current).and_then(Node::children) else {
                continue;
            };
            for &child in children {
                if !visited.insert(child) {
                    continue;
                }
                let contribution = match self.chain_contribution(child, at) {
                    Ok(pose) => pose,
                    // A transform with no sample at `at` cannot be composed
                    // through; the subtree behind it is unreachable at this
                    // stamp.
                    Err(err @ WorldError::NoData(_)) => {
                        if child == target {
                            return Err(err);
                        }
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                let composed = accumulated.compose(contribution);
                if child == target {
                    return Ok(composed);
                }
                queue.push_back((child, composed));
            }
        }

        Err(WorldError::Disconnected { reference, target })
    }

    /// What a node contributes to a transform chain passing through it.
    fn chain_contribution(&self, id: NodeId, at: TimeStamp) -> Result<Pose, WorldError> {
        let node = self.node(id).ok_or(WorldError::NotFound(id))?;
        match &node.kind {
            NodeKind::Transform { history, .. } => history.sample_at(at).ok_or(WorldError::NoData(id)),
            NodeKind::UncertainTransform { history, .. } => {
                history.pose_at(at).ok_or(WorldError::NoData(id))
            }
            _ => Ok(Pose::identity()),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Mutations
    // ────────────────────────────────────────────────────────────────────────

    /// Add a plain tag node under the group `parent`.  Returns the assigned
    /// id.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        attributes: Vec<Attribute>,
        forced: Option<NodeId>,
    ) -> Result<NodeId, WorldError> {
        let result = self.insert_child(parent, attributes.clone(), forced, NodeKind::Leaf);
        self.notify(&GraphUpdate::NodeAdded {
            parent,
            assigned: result.as_ref().ok().copied(),
            attributes,
        });
        result
    }

    /// Add an (empty) group under the group `parent`.
    pub fn add_group(
        &mut self,
        parent: NodeId,
        attributes: Vec<Attribute>,
        forced: Option<NodeId>,
    ) -> Result<NodeId, WorldError> {
        let result = self.insert_child(parent, attributes.clone(), forced, NodeKind::empty_group());
        self.notify(&GraphUpdate::GroupAdded {
            parent,
            assigned: result.as_ref().ok().copied(),
            attributes,
        });
        result
    }

    /// Add a transform node with one initial sample under the group `parent`.
    pub fn add_transform(
        &mut self,
        parent: NodeId,
        attributes: Vec<Attribute>,
        pose: Pose,
        stamp: TimeStamp,
        forced: Option<NodeId>,
    ) -> Result<NodeId, WorldError> {
        let kind = NodeKind::transform(pose, stamp);
        let result = self.insert_child(parent, attributes.clone(), forced, kind);
        self.notify(&GraphUpdate::TransformAdded {
            parent,
            assigned: result.as_ref().ok().copied(),
            attributes,
            pose,
            stamp,
        });
        result
    }

    /// Add an uncertain transform node with one initial sample under the
    /// group `parent`.
    pub fn add_uncertain_transform(
        &mut self,
        parent: NodeId,
        attributes: Vec<Attribute>,
        pose: Pose,
        covariance: PoseCovariance,
        stamp: TimeStamp,
        forced: Option<NodeId>,
    ) -> Result<NodeId, WorldError> {
        let kind = NodeKind::uncertain_transform(pose, covariance, stamp);
        let result = self.insert_child(parent, attributes.clone(), forced, kind);
        self.notify(&GraphUpdate::UncertainTransformAdded {
            parent,
            assigned: result.as_ref().ok().copied(),
            attributes,
            pose,
            covariance,
            stamp,
        });
        result
    }

    /// Add a geometry node carrying `shape` under the group `parent`.
    pub fn add_geometry(
        &mut self,
        parent: NodeId,
        attributes: Vec<Attribute>,
        shape: Shape,
        stamp: TimeStamp,
        forced: Option<NodeId>,
    ) -> Result<NodeId, WorldError> {
        let kind = NodeKind::Geometry {
            shape: shape.clone(),
            stamp,
        };
        let result = self.insert_child(parent, attributes.clone(), forced, kind);
        self.notify(&GraphUpdate::GeometryAdded {
            parent,
            assigned: result.as_ref().ok().copied(),
            attributes,
            shape,
            stamp,
        });
        result
    }

    /// Replace the attributes of `id` wholesale.
    pub fn set_attributes(
        &mut self,
        id: NodeId,
        attributes: Vec<Attribute>,
    ) -> Result<(), WorldError> {
        let result = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.attributes = attributes.clone();
                Ok(())
            }
            None => Err(WorldError::NotFound(id)),
        };
        self.notify(&GraphUpdate::AttributesSet {
            id,
            attributes,
            applied: result.is_ok(),
        });
        result
    }

    /// Append a pose sample to the transform node `id`.  Accepts both plain
    /// and uncertain transforms; for the latter the sample is recorded with
    /// zero covariance.
    pub fn set_transform(
        &mut self,
        id: NodeId,
        pose: Pose,
        stamp: TimeStamp,
    ) -> Result<(), WorldError> {
        let result = match self.nodes.get_mut(&id) {
            Some(Node {
                kind: NodeKind::Transform { history, .. },
                ..
            }) => {
                history.insert(pose, stamp);
                Ok(())
            }
            Some(Node {
                kind: NodeKind::UncertainTransform { history, .. },
                ..
            }) => {
                history.insert(pose, PoseCovariance::zero(), stamp);
                Ok(())
            }
            Some(_) => {
                error!(%id, "node is not a transform, cannot set new pose data");
                Err(WorldError::WrongKind {
                    id,
                    expected: "transform",
                })
            }
            None => Err(WorldError::NotFound(id)),
        };
        self.notify(&GraphUpdate::TransformSet {
            id,
            pose,
            stamp,
            applied: result.is_ok(),
        });
        result
    }

    /// Append a (pose, covariance) sample to the uncertain transform `id`.
    pub fn set_uncertain_transform(
        &mut self,
        id: NodeId,
        pose: Pose,
        covariance: PoseCovariance,
        stamp: TimeStamp,
    ) -> Result<(), WorldError> {
        let result = match self.nodes.get_mut(&id) {
            Some(Node {
                kind: NodeKind::UncertainTransform { history, .. },
                ..
            }) => {
                history.insert(pose, covariance, stamp);
                Ok(())
            }
            Some(_) => {
                error!(%id, "node is not an uncertain transform, cannot set new pose data");
                Err(WorldError::WrongKind {
                    id,
                    expected: "uncertain transform",
                })
            }
            None => Err(WorldError::NotFound(id)),
        };
        self.notify(&GraphUpdate::UncertainTransformSet {
            id,
            pose,
            covariance,
            stamp,
            applied: result.is_ok(),
        });
        result
    }

    /// Delete `id` entirely: the node is detached from every parent group it
    /// currently has, its lookup entry is erased, and any child left without
    /// a parent is collected with it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), WorldError> {
        let result = self.delete_node_inner(id);
        self.notify(&GraphUpdate::NodeDeleted {
            id,
            applied: result.is_ok(),
        });
        result
    }

    fn delete_node_inner(&mut self, id: NodeId) -> Result<(), WorldError> {
        if id == self.root {
            warn!(%id, "the root node cannot be deleted");
            return Err(WorldError::CannotDeleteRoot);
        }
        let node = self.nodes.get(&id).ok_or(WorldError::NotFound(id))?;
        debug_assert!(
            !node.parents.is_empty(),
            "non-root node {id} with no parents survived in the arena"
        );
        // Total removal: sever every owning edge, then collect.
        let parents = node.parents.clone();
        for parent in parents {
            self.unlink(parent, id);
        }
        self.collect(id);
        Ok(())
    }

    /// Give `id` an additional owning parent.  Adding an edge that already
    /// exists is a no-op success (edges have set semantics).
    pub fn add_parent(&mut self, id: NodeId, parent: NodeId) -> Result<(), WorldError> {
        let result = self.add_parent_inner(id, parent);
        self.notify(&GraphUpdate::ParentAdded {
            id,
            parent,
            applied: result.is_ok(),
        });
        result
    }

    fn add_parent_inner(&mut self, id: NodeId, parent: NodeId) -> Result<(), WorldError> {
        if id == self.root {
            warn!("the root node cannot gain a parent");
            return Err(WorldError::CannotDeleteRoot);
        }
        let node = self.nodes.get(&id).ok_or(WorldError::NotFound(id))?;
        let already_linked = node.parents.contains(&parent);
        let parent_node = self.nodes.get(&parent).ok_or(WorldError::NotFound(parent))?;
        if !parent_node.is_group() {
            error!(%parent, "parent is not a group, cannot add a parent-child relation");
            return Err(WorldError::WrongKind {
                id: parent,
                expected: "group",
            });
        }
        if !already_linked {
            self.link(parent, id);
        }
        Ok(())
    }

    /// Remove the owning edge between `id` and the group `parent`.  When this
    /// was the node's last parent, the node becomes unreachable and is
    /// collected together with any part of its subtree it solely owned.
    pub fn remove_parent(&mut self, id: NodeId, parent: NodeId) -> Result<(), WorldError> {
        let result = self.remove_parent_inner(id, parent);
        self.notify(&GraphUpdate::ParentRemoved {
            id,
            parent,
            applied: result.is_ok(),
        });
        result
    }

    fn remove_parent_inner(&mut self, id: NodeId, parent: NodeId) -> Result<(), WorldError> {
        let node = self.nodes.get(&id).ok_or(WorldError::NotFound(id))?;
        if node.parents.is_empty() {
            // Only the root legitimately has zero parents; anything else here
            // means the collection invariant broke.
            debug_assert_eq!(id, self.root, "non-root node {id} with no parents");
            warn!(%id, "node has no parents that could be removed");
            return Err(WorldError::NotFound(parent));
        }
        if !node.parents.contains(&parent) {
            return Err(WorldError::NotFound(parent));
        }
        self.unlink(parent, id);
        let orphaned = self
            .nodes
            .get(&id)
            .map(|n| n.parents.is_empty())
            .unwrap_or(false);
        if orphaned {
            self.collect(id);
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Observers & traversal
    // ────────────────────────────────────────────────────────────────────────

    /// Attach an observer.  It will be notified of every subsequent attempted
    /// mutation, after any previously attached observer.
    pub fn attach_observer(&mut self, observer: Box<dyn UpdateObserver>) -> ObserverId {
        let token = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((token, observer));
        token
    }

    /// Detach the observer identified by `token`, handing it back to the
    /// caller.
    pub fn detach_observer(
        &mut self,
        token: ObserverId,
    ) -> Result<Box<dyn UpdateObserver>, WorldError> {
        match self.observers.iter().position(|(t, _)| *t == token) {
            Some(index) => Ok(self.observers.remove(index).1),
            None => {
                error!("cannot detach update observer: token does not match any attached observer");
                Err(WorldError::ObserverNotFound)
            }
        }
    }

    /// Hand `visitor` the node `start` and let it drive the traversal from
    /// there through the shared accessors.
    pub fn execute_traversal(
        &self,
        visitor: &mut dyn NodeVisitor,
        start: NodeId,
    ) -> Result<(), WorldError> {
        if !self.contains(start) {
            return Err(WorldError::NotFound(start));
        }
        visitor.visit(self, start);
        Ok(())
    }

    fn notify(&mut self, update: &GraphUpdate) {
        for (_, observer) in &mut self.observers {
            observer.receive_update(update);
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Internal edge bookkeeping
    // ────────────────────────────────────────────────────────────────────────

    /// Create the owning edge parent→child and the back-reference.  Both
    /// nodes must exist and `parent` must be a group.
    fn link(&mut self, parent: NodeId, child: NodeId) {
        match self.nodes.get_mut(&parent).and_then(Node::children_mut) {
            Some(children) => children.push(child),
            None => debug_assert!(false, "link target {parent} is not a live group"),
        }
        match self.nodes.get_mut(&child) {
            Some(node) => node.parents.push(parent),
            None => debug_assert!(false, "link source {child} vanished mid-link"),
        }
    }

    /// Sever the owning edge parent→child and the back-reference.  Does not
    /// collect; callers decide.
    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        if let Some(children) = self.nodes.get_mut(&parent).and_then(Node::children_mut) {
            children.retain(|c| *c != child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parents.retain(|p| *p != parent);
        }
    }

    /// Erase an unreachable node from the arena and cascade to every child
    /// that thereby loses its last parent.
    fn collect(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        debug_assert!(
            node.parents.is_empty(),
            "collecting node {id} that still has parents"
        );
        debug!(%id, kind = node.kind.name(), "collected unreachable node");
        let children = match node.kind {
            NodeKind::Group { children } => children,
            NodeKind::Transform { children, .. } => children,
            NodeKind::UncertainTransform { children, .. } => children,
            NodeKind::Leaf | NodeKind::Geometry { .. } => Vec::new(),
        };
        for child in children {
            let orphaned = match self.nodes.get_mut(&child) {
                Some(c) => {
                    c.parents.retain(|p| *p != id);
                    c.parents.is_empty()
                }
                None => false,
            };
            if orphaned {
                self.collect(child);
            }
        }
    }

    /// Three-phase insert shared by all add operations.
    fn insert_child(
        &mut self,
        parent: NodeId,
        attributes: Vec<Attribute>,
        forced: Option<NodeId>,
        kind: NodeKind,
    ) -> Result<NodeId, WorldError> {
        // Resolve + validate parent.
        let parent_node = self.nodes.get(&parent).ok_or(WorldError::NotFound(parent))?;
        if !parent_node.is_group() {
            error!(%parent, new_kind = kind.name(), "parent is not a group, cannot add a child");
            return Err(WorldError::WrongKind {
                id: parent,
                expected: "group",
            });
        }
        // Validate id availability; the generator is only touched once the
        // parent checks passed, so a rejected call mutates nothing.
        let id = self.claim_id(forced)?;
        // Commit.
        self.nodes.insert(id, Node::new(id, attributes, kind));
        self.link(parent, id);
        Ok(id)
    }

    fn claim_id(&mut self, forced: Option<NodeId>) -> Result<NodeId, WorldError> {
        match forced {
            Some(id) => {
                if self.nodes.contains_key(&id) || !self.ids.reserve(id) {
                    warn!(%id, "forced id cannot be assigned, an object with that id exists already");
                    Err(WorldError::IdUnavailable(id))
                } else {
                    Ok(id)
                }
            }
            None => Ok(self.ids.next_id()),
        }
    }
}

impl Default for WorldGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::geometry::Vec3;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pose_x(x: f32) -> Pose {
        Pose::from_translation(Vec3::new(x, 0.0, 0.0))
    }

    fn stamp(secs: f64) -> TimeStamp {
        TimeStamp::from_secs(secs)
    }

    fn named(name: &str) -> Vec<Attribute> {
        vec![Attribute::new("name", name)]
    }

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    /// Observer that records every update into shared storage the test keeps
    /// a handle to.
    struct Recorder {
        updates: Rc<RefCell<Vec<GraphUpdate>>>,
    }

    impl Recorder {
        fn new() -> (Box<Self>, Rc<RefCell<Vec<GraphUpdate>>>) {
            let updates = Rc::new(RefCell::new(Vec::new()));
            (
                Box::new(Self {
                    updates: updates.clone(),
                }),
                updates,
            )
        }
    }

    impl UpdateObserver for Recorder {
        fn receive_update(&mut self, update: &GraphUpdate) {
            self.updates.borrow_mut().push(update.clone());
        }
    }

    // ------------------------------------------------------------------
    // Identity & lifetime
    // ------------------------------------------------------------------

    #[test]
    fn fresh_graph_has_only_root() {
        let graph = WorldGraph::new();
        assert_eq!(graph.node_count(), 1);
        assert!(graph.contains(graph.root_id()));
        assert_eq!(graph.children(graph.root_id()).unwrap(), vec![]);
        assert_eq!(graph.parents(graph.root_id()).unwrap(), vec![]);
    }

    #[test]
    fn added_nodes_get_unique_ids() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let mut seen = std::collections::HashSet::new();
        seen.insert(root);
        for i in 0..50 {
            let id = graph.add_node(root, named(&format!("n{i}")), None).unwrap();
            assert!(seen.insert(id), "id {id} issued twice");
        }
        assert_eq!(graph.node_count(), 51);
    }

    #[test]
    fn add_node_under_missing_parent_fails() {
        let mut graph = WorldGraph::new();
        let ghost = NodeId::new(999);
        let err = graph.add_node(ghost, vec![], None).unwrap_err();
        assert_eq!(err, WorldError::NotFound(ghost));
    }

    #[test]
    fn add_node_under_non_group_fails() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let leaf = graph.add_node(root, vec![], None).unwrap();
        let err = graph.add_node(leaf, vec![], None).unwrap_err();
        assert_eq!(
            err,
            WorldError::WrongKind {
                id: leaf,
                expected: "group"
            }
        );
    }

    #[test]
    fn forced_id_is_honoured_and_never_reissued() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let forced = NodeId::new(500);
        let assigned = graph.add_group(root, vec![], Some(forced)).unwrap();
        assert_eq!(assigned, forced);

        for _ in 0..600 {
            let id = graph.add_node(root, vec![], None).unwrap();
            assert_ne!(id, forced);
        }
    }

    #[test]
    fn forcing_a_live_id_fails_without_mutating() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let existing = graph.add_node(root, named("a"), None).unwrap();
        let count_before = graph.node_count();

        let err = graph.add_node(root, named("b"), Some(existing)).unwrap_err();
        assert_eq!(err, WorldError::IdUnavailable(existing));
        assert_eq!(graph.node_count(), count_before);
        // The original node is untouched.
        assert_eq!(graph.attributes(existing).unwrap(), named("a"));
    }

    #[test]
    fn forcing_the_root_id_fails() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let err = graph.add_group(root, vec![], Some(root)).unwrap_err();
        assert_eq!(err, WorldError::IdUnavailable(root));
    }

    // ------------------------------------------------------------------
    // Attributes & structure queries
    // ------------------------------------------------------------------

    #[test]
    fn attributes_set_and_query() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let id = graph.add_node(root, named("sensor"), None).unwrap();
        assert_eq!(graph.attributes(id).unwrap(), named("sensor"));

        graph
            .set_attributes(id, vec![Attribute::new("name", "lidar"), Attribute::new("hz", "10")])
            .unwrap();
        let attrs = graph.attributes(id).unwrap();
        assert_eq!(attrs.len(), 2);
        assert!(attrs.contains(&Attribute::new("hz", "10")));

        let ghost = NodeId::new(404);
        assert_eq!(
            graph.set_attributes(ghost, vec![]).unwrap_err(),
            WorldError::NotFound(ghost)
        );
    }

    #[test]
    fn list_nodes_filters_by_attribute_superset() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let scene = vec![Attribute::new("taskType", "sceneObject")];
        let a = graph.add_node(root, scene.clone(), None).unwrap();
        let group = graph.add_group(root, scene.clone(), None).unwrap();
        let _other = graph.add_node(root, named("unrelated"), None).unwrap();
        let nested = graph.add_node(group, scene.clone(), None).unwrap();

        let found = graph.list_nodes(&scene);
        assert_eq!(found.len(), 3);
        for id in [a, group, nested] {
            assert!(found.contains(&id));
        }

        // Empty filter matches everything reachable, root included.
        let all = graph.list_nodes(&[]);
        assert_eq!(all.len(), graph.node_count());
        assert!(all.contains(&root));
    }

    #[test]
    fn children_of_non_group_is_wrong_kind() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let leaf = graph.add_node(root, vec![], None).unwrap();
        assert_eq!(
            graph.children(leaf).unwrap_err(),
            WorldError::WrongKind {
                id: leaf,
                expected: "group"
            }
        );
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    #[test]
    fn transform_query_is_at_or_before() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let tf = graph
            .add_transform(root, named("odom"), pose_x(1.0), stamp(1.0), None)
            .unwrap();
        graph.set_transform(tf, pose_x(2.0), stamp(2.0)).unwrap();
        graph.set_transform(tf, pose_x(3.0), stamp(3.0)).unwrap();

        let p = graph.transform(tf, stamp(2.0)).unwrap();
        assert!((p.translation.x - 2.0).abs() < 1e-6);

        let p = graph.transform(tf, stamp(2.5)).unwrap();
        assert!((p.translation.x - 2.0).abs() < 1e-6);

        assert_eq!(graph.transform(tf, stamp(0.5)).unwrap_err(), WorldError::NoData(tf));
    }

    #[test]
    fn set_transform_on_wrong_kind_fails() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let leaf = graph.add_node(root, vec![], None).unwrap();
        assert_eq!(
            graph.set_transform(leaf, pose_x(1.0), stamp(1.0)).unwrap_err(),
            WorldError::WrongKind {
                id: leaf,
                expected: "transform"
            }
        );
        // Group is not a transform either; the root must reject pose queries.
        assert!(matches!(
            graph.transform(root, stamp(1.0)),
            Err(WorldError::WrongKind { .. })
        ));
    }

    #[test]
    fn uncertain_transform_roundtrip() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let cov = PoseCovariance::from_diagonal([0.1, 0.1, 0.1, 0.01, 0.01, 0.01]);
        let utf = graph
            .add_uncertain_transform(root, named("slam"), pose_x(1.0), cov, stamp(1.0), None)
            .unwrap();

        let (pose, got_cov) = graph.uncertain_transform(utf, stamp(5.0)).unwrap();
        assert!((pose.translation.x - 1.0).abs() < 1e-6);
        assert_eq!(got_cov, cov);

        // Plain transform query also works against an uncertain transform.
        assert!(graph.transform(utf, stamp(5.0)).is_ok());

        // But a plain transform does not satisfy the uncertain query.
        let tf = graph
            .add_transform(root, vec![], pose_x(2.0), stamp(1.0), None)
            .unwrap();
        assert_eq!(
            graph.uncertain_transform(tf, stamp(1.0)).unwrap_err(),
            WorldError::WrongKind {
                id: tf,
                expected: "uncertain transform"
            }
        );
        assert_eq!(
            graph
                .set_uncertain_transform(tf, pose_x(1.0), cov, stamp(2.0))
                .unwrap_err(),
            WorldError::WrongKind {
                id: tf,
                expected: "uncertain transform"
            }
        );
    }

    #[test]
    fn geometry_roundtrip() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let shape = Shape::Cuboid {
            x: 1.0,
            y: 0.5,
            z: 0.25,
        };
        let geo = graph
            .add_geometry(root, named("box"), shape.clone(), stamp(4.0), None)
            .unwrap();

        let (got, at) = graph.geometry(geo).unwrap();
        assert_eq!(got, shape);
        assert_eq!(at, stamp(4.0));

        assert!(matches!(
            graph.geometry(root),
            Err(WorldError::WrongKind { .. })
        ));
    }

    // ------------------------------------------------------------------
    // Relative transform composition
    // ------------------------------------------------------------------

    #[test]
    fn transform_between_composes_parent_then_child() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        // root → A(Ta: +1 m x) → B(Tb: +0.5 m x); transforms own children.
        let a = graph
            .add_transform(root, named("a"), pose_x(1.0), stamp(1.0), None)
            .unwrap();
        let b = graph
            .add_transform(a, named("b"), pose_x(0.5), stamp(1.0), None)
            .unwrap();

        // Pose of B relative to root is Ta·Tb.
        let p = graph.transform_between(b, root, stamp(1.0)).unwrap();
        assert!((p.translation.x - 1.5).abs() < 1e-6, "x={}", p.translation.x);

        // A mid-chain query only picks up Ta.
        let p = graph.transform_between(a, root, stamp(1.0)).unwrap();
        assert!((p.translation.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn transform_between_uses_samples_at_the_queried_stamp() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let g = graph.add_group(root, named("g"), None).unwrap();
        let ta = graph
            .add_transform(g, named("ta"), pose_x(1.0), stamp(1.0), None)
            .unwrap();
        graph.set_transform(ta, pose_x(7.0), stamp(5.0)).unwrap();
        let leaf = graph.add_geometry(
            ta,
            named("probe"),
            Shape::Sphere { radius: 0.05 },
            stamp(1.0),
            None,
        );
        let leaf = leaf.unwrap();

        // Groups and geometry contribute identity; the sample at the queried
        // stamp wins.
        let p = graph.transform_between(leaf, root, stamp(2.0)).unwrap();
        assert!((p.translation.x - 1.0).abs() < 1e-6);
        let p = graph.transform_between(leaf, root, stamp(6.0)).unwrap();
        assert!((p.translation.x - 7.0).abs() < 1e-6);
    }

    #[test]
    fn transform_between_disconnected_fails() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let g1 = graph.add_group(root, named("g1"), None).unwrap();
        let g2 = graph.add_group(root, named("g2"), None).unwrap();

        // Sibling groups have no directed ownership path between them.
        assert_eq!(
            graph.transform_between(g1, g2, stamp(1.0)).unwrap_err(),
            WorldError::Disconnected {
                reference: g2,
                target: g1
            }
        );
        // Same node: identity.
        let p = graph.transform_between(g1, g1, stamp(1.0)).unwrap();
        assert_eq!(p, Pose::identity());
    }

    #[test]
    fn transform_between_propagates_no_data_on_the_path() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let tf = graph
            .add_transform(root, named("late"), pose_x(1.0), stamp(10.0), None)
            .unwrap();

        // Query before the only sample: the chain cannot be composed.
        assert_eq!(
            graph.transform_between(tf, root, stamp(1.0)).unwrap_err(),
            WorldError::NoData(tf)
        );
    }

    // ------------------------------------------------------------------
    // Deletion, multi-parent DAG & collection
    // ------------------------------------------------------------------

    #[test]
    fn root_cannot_be_deleted() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        assert_eq!(graph.delete_node(root).unwrap_err(), WorldError::CannotDeleteRoot);
        assert!(graph.contains(root));
    }

    #[test]
    fn deleted_node_stops_resolving() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let id = graph.add_node(root, named("temp"), None).unwrap();
        graph.delete_node(id).unwrap();

        assert_eq!(graph.attributes(id).unwrap_err(), WorldError::NotFound(id));
        assert_eq!(graph.children(root).unwrap(), vec![]);
        assert_eq!(graph.delete_node(id).unwrap_err(), WorldError::NotFound(id));
    }

    #[test]
    fn delete_is_total_removal_across_all_parents() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let g1 = graph.add_group(root, named("g1"), None).unwrap();
        let g2 = graph.add_group(root, named("g2"), None).unwrap();
        let n = graph.add_node(g1, named("n"), None).unwrap();
        graph.add_parent(n, g2).unwrap();
        assert_eq!(graph.parents(n).unwrap().len(), 2);

        graph.delete_node(n).unwrap();
        assert!(!graph.contains(n));
        assert_eq!(graph.children(g1).unwrap(), vec![]);
        assert_eq!(graph.children(g2).unwrap(), vec![]);
    }

    #[test]
    fn multi_parent_node_survives_until_last_parent_removed() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let g1 = graph.add_group(root, named("g1"), None).unwrap();
        let g2 = graph.add_group(root, named("g2"), None).unwrap();
        let n = graph.add_node(g1, named("shared"), None).unwrap();
        graph.add_parent(n, g2).unwrap();

        graph.remove_parent(n, g1).unwrap();
        assert!(graph.contains(n), "node must survive while g2 owns it");
        assert_eq!(graph.parents(n).unwrap(), vec![g2]);

        graph.remove_parent(n, g2).unwrap();
        assert!(!graph.contains(n), "last parent removed, node collected");
        assert_eq!(graph.attributes(n).unwrap_err(), WorldError::NotFound(n));
    }

    #[test]
    fn collection_cascades_through_solely_owned_subtree() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let g = graph.add_group(root, named("g"), None).unwrap();
        let inner = graph.add_group(g, named("inner"), None).unwrap();
        let leaf = graph.add_node(inner, named("leaf"), None).unwrap();
        // `kept` has a second parent and must survive the cascade.
        let kept = graph.add_node(inner, named("kept"), None).unwrap();
        graph.add_parent(kept, root).unwrap();

        graph.delete_node(g).unwrap();
        assert!(!graph.contains(g));
        assert!(!graph.contains(inner));
        assert!(!graph.contains(leaf));
        assert!(graph.contains(kept));
        assert_eq!(graph.parents(kept).unwrap(), vec![root]);
    }

    #[test]
    fn collection_cascades_through_transform_children() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let tf = graph
            .add_transform(root, named("frame"), pose_x(1.0), stamp(1.0), None)
            .unwrap();
        let sensor = graph.add_node(tf, named("sensor"), None).unwrap();

        graph.delete_node(tf).unwrap();
        assert!(!graph.contains(tf));
        assert!(!graph.contains(sensor), "transform children must be collected too");
    }

    #[test]
    fn add_parent_validations() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let leaf = graph.add_node(root, vec![], None).unwrap();
        let n = graph.add_node(root, vec![], None).unwrap();
        let ghost = NodeId::new(777);

        assert_eq!(graph.add_parent(ghost, root).unwrap_err(), WorldError::NotFound(ghost));
        assert_eq!(graph.add_parent(n, ghost).unwrap_err(), WorldError::NotFound(ghost));
        assert_eq!(
            graph.add_parent(n, leaf).unwrap_err(),
            WorldError::WrongKind {
                id: leaf,
                expected: "group"
            }
        );
        assert_eq!(graph.add_parent(root, root).unwrap_err(), WorldError::CannotDeleteRoot);

        // Duplicate edge is a no-op success.
        graph.add_parent(n, root).unwrap();
        assert_eq!(graph.parents(n).unwrap(), vec![root]);
        assert_eq!(graph.children(root).unwrap().iter().filter(|c| **c == n).count(), 1);
    }

    #[test]
    fn remove_parent_validations() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let g = graph.add_group(root, vec![], None).unwrap();
        let n = graph.add_node(root, vec![], None).unwrap();

        // g is not a parent of n.
        assert_eq!(graph.remove_parent(n, g).unwrap_err(), WorldError::NotFound(g));
        // Root has no parents at all.
        assert_eq!(graph.remove_parent(root, g).unwrap_err(), WorldError::NotFound(g));
        assert!(graph.contains(n));
    }

    // ------------------------------------------------------------------
    // Observer fan-out
    // ------------------------------------------------------------------

    #[test]
    fn observers_see_successful_mutations_in_attachment_order() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let (first, first_log) = Recorder::new();
        let (second, second_log) = Recorder::new();
        graph.attach_observer(first);
        graph.attach_observer(second);

        let id = graph.add_group(root, named("g"), None).unwrap();

        for log in [&first_log, &second_log] {
            let updates = log.borrow();
            assert_eq!(updates.len(), 1);
            match &updates[0] {
                GraphUpdate::GroupAdded { parent, assigned, .. } => {
                    assert_eq!(*parent, root);
                    assert_eq!(*assigned, Some(id));
                }
                other => panic!("unexpected update {other:?}"),
            }
        }
    }

    #[test]
    fn observers_are_notified_of_failed_mutations() {
        let mut graph = WorldGraph::new();
        let (observer, log) = Recorder::new();
        graph.attach_observer(observer);

        let ghost = NodeId::new(12345);
        assert!(graph.add_group(ghost, vec![], None).is_err());
        assert!(graph.delete_node(graph.root_id()).is_err());

        let updates = log.borrow();
        assert_eq!(updates.len(), 2);
        assert!(matches!(
            &updates[0],
            GraphUpdate::GroupAdded { assigned: None, parent, .. } if *parent == ghost
        ));
        assert!(matches!(
            &updates[1],
            GraphUpdate::NodeDeleted { applied: false, .. }
        ));
        assert!(updates.iter().all(|u| !u.was_applied()));
    }

    #[test]
    fn detached_observer_stops_receiving() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let (observer, log) = Recorder::new();
        let token = graph.attach_observer(observer);

        graph.add_node(root, vec![], None).unwrap();
        let _observer = graph.detach_observer(token).unwrap();
        graph.add_node(root, vec![], None).unwrap();

        assert_eq!(log.borrow().len(), 1);
        assert_eq!(
            graph.detach_observer(token).unwrap_err(),
            WorldError::ObserverNotFound
        );
    }

    #[test]
    fn every_mutation_kind_reaches_observers() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let (observer, log) = Recorder::new();
        graph.attach_observer(observer);

        let g = graph.add_group(root, vec![], None).unwrap();
        let n = graph.add_node(g, vec![], None).unwrap();
        let tf = graph
            .add_transform(g, vec![], pose_x(1.0), stamp(1.0), None)
            .unwrap();
        let utf = graph
            .add_uncertain_transform(
                g,
                vec![],
                pose_x(1.0),
                PoseCovariance::zero(),
                stamp(1.0),
                None,
            )
            .unwrap();
        graph
            .add_geometry(g, vec![], Shape::Sphere { radius: 0.1 }, stamp(1.0), None)
            .unwrap();
        graph.set_attributes(n, named("renamed")).unwrap();
        graph.set_transform(tf, pose_x(2.0), stamp(2.0)).unwrap();
        graph
            .set_uncertain_transform(utf, pose_x(2.0), PoseCovariance::zero(), stamp(2.0))
            .unwrap();
        graph.add_parent(n, root).unwrap();
        graph.remove_parent(n, root).unwrap();
        graph.delete_node(n).unwrap();

        let kinds: Vec<&'static str> = log.borrow().iter().map(GraphUpdate::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "group_added",
                "node_added",
                "transform_added",
                "uncertain_transform_added",
                "geometry_added",
                "attributes_set",
                "transform_set",
                "uncertain_transform_set",
                "parent_added",
                "parent_removed",
                "node_deleted",
            ]
        );
        assert!(log.borrow().iter().all(GraphUpdate::was_applied));
    }

    // ------------------------------------------------------------------
    // Traversal entry point
    // ------------------------------------------------------------------

    #[test]
    fn execute_traversal_requires_live_start() {
        let graph = WorldGraph::new();
        let mut finder = AttributeFinder::new(vec![]);
        assert!(graph.execute_traversal(&mut finder, graph.root_id()).is_ok());
        assert_eq!(
            graph
                .execute_traversal(&mut finder, NodeId::new(999))
                .unwrap_err(),
            WorldError::NotFound(NodeId::new(999))
        );
    }
}
