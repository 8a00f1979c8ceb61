//! Node variants of the world-model graph.
//!
//! The node variants form a closed tagged union ([`NodeKind`]) so every
//! dispatch site is an exhaustive match; there is no downcast-and-check
//! anywhere.
//!
//! Ownership is arena-based: a parent group owns its children through id
//! slots in its child list, and a child points back at its parents through
//! plain ids.  The arena (held by the facade) frees a node exactly when its
//! last parent slot is severed.

use atlas_types::geometry::{Pose, PoseCovariance, PoseSample, Shape, UncertainPoseSample};
use atlas_types::{Attribute, NodeId, TimeStamp};

// ────────────────────────────────────────────────────────────────────────────
// Transform histories
// ────────────────────────────────────────────────────────────────────────────

/// Time-indexed pose history, kept sorted ascending by stamp.
///
/// Insertion is append-mostly but an out-of-order stamp is accepted and
/// placed in time order.  Lookups return the most recent sample at or before
/// the queried stamp; there is no extrapolation.
#[derive(Debug, Clone, Default)]
pub struct TransformHistory {
    samples: Vec<PoseSample>,
}

impl TransformHistory {
    /// A history with a single initial sample.
    pub fn with_sample(pose: Pose, stamp: TimeStamp) -> Self {
        let mut history = Self::default();
        history.insert(pose, stamp);
        history
    }

    /// Insert a sample, keeping the history sorted.  Equal stamps are kept in
    /// insertion order (the later insert wins lookups at that stamp).
    pub fn insert(&mut self, pose: Pose, stamp: TimeStamp) {
        let at = self.samples.partition_point(|s| s.stamp <= stamp);
        self.samples.insert(at, PoseSample { stamp, pose });
    }

    /// The most recent pose at or before `at`, or `None` when the history is
    /// empty or every sample is strictly newer.
    pub fn sample_at(&self, at: TimeStamp) -> Option<Pose> {
        let idx = self.samples.partition_point(|s| s.stamp <= at);
        (idx > 0).then(|| self.samples[idx - 1].pose)
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Time-indexed pose history where each sample carries an uncertainty
/// descriptor.  Same ordering and lookup rules as [`TransformHistory`].
#[derive(Debug, Clone, Default)]
pub struct UncertainHistory {
    samples: Vec<UncertainPoseSample>,
}

impl UncertainHistory {
    /// A history with a single initial sample.
    pub fn with_sample(pose: Pose, covariance: PoseCovariance, stamp: TimeStamp) -> Self {
        let mut history = Self::default();
        history.insert(pose, covariance, stamp);
        history
    }

    /// Insert a sample, keeping the history sorted.
    pub fn insert(&mut self, pose: Pose, covariance: PoseCovariance, stamp: TimeStamp) {
        let at = self.samples.partition_point(|s| s.stamp <= stamp);
        self.samples.insert(
            at,
            UncertainPoseSample {
                stamp,
                pose,
                covariance,
            },
        );
    }

    /// The most recent pose at or before `at`.
    pub fn pose_at(&self, at: TimeStamp) -> Option<Pose> {
        self.sample_at(at).map(|s| s.pose)
    }

    /// The most recent (pose, covariance) pair at or before `at`.
    pub fn sample_at(&self, at: TimeStamp) -> Option<UncertainPoseSample> {
        let idx = self.samples.partition_point(|s| s.stamp <= at);
        (idx > 0).then(|| self.samples[idx - 1])
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Node
// ────────────────────────────────────────────────────────────────────────────

/// The closed set of node variants.
///
/// Transforms have the group capability: a transform node is an interior
/// frame of the graph and owns children exactly like a plain group.  Leaves
/// and geometry nodes terminate a branch.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A plain tag container with no payload.
    Leaf,
    /// An ownership container: the ordered child list holds the strong
    /// references that keep nodes alive.
    Group { children: Vec<NodeId> },
    /// A time-indexed rigid-transform history; owns children like a group.
    Transform {
        children: Vec<NodeId>,
        history: TransformHistory,
    },
    /// A transform history where every sample carries uncertainty; owns
    /// children like a group.
    UncertainTransform {
        children: Vec<NodeId>,
        history: UncertainHistory,
    },
    /// A single shape payload with one associated stamp; no history.
    Geometry { shape: Shape, stamp: TimeStamp },
}

impl NodeKind {
    /// An empty group.
    pub fn empty_group() -> Self {
        Self::Group {
            children: Vec::new(),
        }
    }

    /// A transform with a single initial sample and no children.
    pub fn transform(pose: Pose, stamp: TimeStamp) -> Self {
        Self::Transform {
            children: Vec::new(),
            history: TransformHistory::with_sample(pose, stamp),
        }
    }

    /// An uncertain transform with a single initial sample and no children.
    pub fn uncertain_transform(pose: Pose, covariance: PoseCovariance, stamp: TimeStamp) -> Self {
        Self::UncertainTransform {
            children: Vec::new(),
            history: UncertainHistory::with_sample(pose, covariance, stamp),
        }
    }

    /// Short lower-case name of the variant, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Leaf => "node",
            Self::Group { .. } => "group",
            Self::Transform { .. } => "transform",
            Self::UncertainTransform { .. } => "uncertain transform",
            Self::Geometry { .. } => "geometric node",
        }
    }
}

/// A graph entity: id, semantic attributes, parent back-references and the
/// variant payload.
///
/// `parents` carries plain ids only – never owning handles – and has set
/// semantics: a (parent, child) edge exists at most once.  A node with zero
/// parents is unreachable and gets collected by the facade, except the root
/// group.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub attributes: Vec<Attribute>,
    pub parents: Vec<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    /// Create a node with no parents yet.
    pub fn new(id: NodeId, attributes: Vec<Attribute>, kind: NodeKind) -> Self {
        Self {
            id,
            attributes,
            parents: Vec::new(),
            kind,
        }
    }

    /// Whether this node has the group capability (plain groups and both
    /// transform variants own children).
    pub fn is_group(&self) -> bool {
        self.children().is_some()
    }

    /// The child list, when this node has the group capability.
    pub fn children(&self) -> Option<&[NodeId]> {
        match &self.kind {
            NodeKind::Group { children }
            | NodeKind::Transform { children, .. }
            | NodeKind::UncertainTransform { children, .. } => Some(children),
            NodeKind::Leaf | NodeKind::Geometry { .. } => None,
        }
    }

    /// Mutable child list, when this node has the group capability.
    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.kind {
            NodeKind::Group { children }
            | NodeKind::Transform { children, .. }
            | NodeKind::UncertainTransform { children, .. } => Some(children),
            NodeKind::Leaf | NodeKind::Geometry { .. } => None,
        }
    }

    /// Superset attribute match: true when every filter entry appears in this
    /// node's attributes (AND over all entries).  An empty filter matches
    /// every node.
    pub fn matches(&self, filter: &[Attribute]) -> bool {
        filter.iter().all(|wanted| self.attributes.contains(wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::geometry::Vec3;

    fn pose_x(x: f32) -> Pose {
        Pose::from_translation(Vec3::new(x, 0.0, 0.0))
    }

    // ── TransformHistory ────────────────────────────────────────────────────

    #[test]
    fn history_lookup_is_at_or_before() {
        let mut history = TransformHistory::default();
        history.insert(pose_x(1.0), TimeStamp::from_secs(1.0));
        history.insert(pose_x(2.0), TimeStamp::from_secs(2.0));
        history.insert(pose_x(3.0), TimeStamp::from_secs(3.0));

        // Exact hit.
        let p = history.sample_at(TimeStamp::from_secs(2.0)).unwrap();
        assert!((p.translation.x - 2.0).abs() < 1e-6);

        // Between samples: most recent at-or-before wins.
        let p = history.sample_at(TimeStamp::from_secs(2.5)).unwrap();
        assert!((p.translation.x - 2.0).abs() < 1e-6);

        // After the newest sample: latest wins, no extrapolation.
        let p = history.sample_at(TimeStamp::from_secs(99.0)).unwrap();
        assert!((p.translation.x - 3.0).abs() < 1e-6);

        // Before the oldest sample: no data.
        assert!(history.sample_at(TimeStamp::from_secs(0.5)).is_none());
    }

    #[test]
    fn history_accepts_out_of_order_insert() {
        let mut history = TransformHistory::default();
        history.insert(pose_x(3.0), TimeStamp::from_secs(3.0));
        history.insert(pose_x(1.0), TimeStamp::from_secs(1.0));
        history.insert(pose_x(2.0), TimeStamp::from_secs(2.0));

        let p = history.sample_at(TimeStamp::from_secs(2.2)).unwrap();
        assert!((p.translation.x - 2.0).abs() < 1e-6);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn history_equal_stamp_later_insert_wins() {
        let mut history = TransformHistory::default();
        history.insert(pose_x(1.0), TimeStamp::from_secs(1.0));
        history.insert(pose_x(9.0), TimeStamp::from_secs(1.0));

        let p = history.sample_at(TimeStamp::from_secs(1.0)).unwrap();
        assert!((p.translation.x - 9.0).abs() < 1e-6);
    }

    #[test]
    fn empty_history_has_no_data() {
        let history = TransformHistory::default();
        assert!(history.is_empty());
        assert!(history.sample_at(TimeStamp::from_secs(1.0)).is_none());
    }

    // ── UncertainHistory ────────────────────────────────────────────────────

    #[test]
    fn uncertain_history_returns_pose_and_covariance() {
        let cov = PoseCovariance::from_diagonal([0.1; 6]);
        let history = UncertainHistory::with_sample(pose_x(1.0), cov, TimeStamp::from_secs(1.0));

        let sample = history.sample_at(TimeStamp::from_secs(2.0)).unwrap();
        assert!((sample.pose.translation.x - 1.0).abs() < 1e-6);
        assert_eq!(sample.covariance, cov);
        assert!(history.sample_at(TimeStamp::from_secs(0.0)).is_none());
    }

    // ── Node ────────────────────────────────────────────────────────────────

    #[test]
    fn matches_is_superset_and() {
        let node = Node::new(
            NodeId::new(7),
            vec![
                Attribute::new("name", "box_1"),
                Attribute::new("taskType", "sceneObject"),
            ],
            NodeKind::Leaf,
        );

        assert!(node.matches(&[]));
        assert!(node.matches(&[Attribute::new("name", "box_1")]));
        assert!(node.matches(&[
            Attribute::new("taskType", "sceneObject"),
            Attribute::new("name", "box_1"),
        ]));
        assert!(!node.matches(&[Attribute::new("name", "box_2")]));
        assert!(!node.matches(&[
            Attribute::new("name", "box_1"),
            Attribute::new("color", "red"),
        ]));
    }

    #[test]
    fn matches_handles_duplicate_keys() {
        // Attributes are a multiset; two entries may share a key.
        let node = Node::new(
            NodeId::new(8),
            vec![
                Attribute::new("tag", "graspable"),
                Attribute::new("tag", "obstacle"),
            ],
            NodeKind::Leaf,
        );

        assert!(node.matches(&[Attribute::new("tag", "graspable")]));
        assert!(node.matches(&[Attribute::new("tag", "obstacle")]));
        assert!(node.matches(&[
            Attribute::new("tag", "graspable"),
            Attribute::new("tag", "obstacle"),
        ]));
        assert!(!node.matches(&[Attribute::new("tag", "fragile")]));
    }

    #[test]
    fn kind_names_and_group_accessors() {
        let mut group = Node::new(NodeId::new(2), vec![], NodeKind::empty_group());
        assert!(group.is_group());
        assert_eq!(group.kind.name(), "group");
        group.children_mut().unwrap().push(NodeId::new(3));
        assert_eq!(group.children().unwrap(), &[NodeId::new(3)]);

        let leaf = Node::new(NodeId::new(4), vec![], NodeKind::Leaf);
        assert!(!leaf.is_group());
        assert!(leaf.children().is_none());
    }
}
