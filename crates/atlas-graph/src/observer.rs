//! Update-observer protocol.
//!
//! After every attempted mutation – successful or not – the facade hands
//! every attached observer the same [`GraphUpdate`], in attachment order,
//! synchronously inside the mutation.  Observers that do expensive work
//! (rendering, I/O, network mirroring) must hand off internally and return
//! quickly, otherwise they stall the whole graph; `atlas-export` ships an
//! async relay for exactly that.
//!
//! Failed attempts are notified too.  Each variant carries the outcome –
//! `assigned: None` for a rejected add, `applied: false` for a rejected
//! set/delete/link – so observers can safely ignore attempts that never
//! touched the graph.

use atlas_types::geometry::{Pose, PoseCovariance, Shape};
use atlas_types::{Attribute, NodeId, TimeStamp};
use serde::{Deserialize, Serialize};

/// One attempted mutation, mirrored to observers with the arguments of the
/// facade call plus the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphUpdate {
    NodeAdded {
        parent: NodeId,
        /// The freshly assigned id, or `None` when the attempt was rejected.
        assigned: Option<NodeId>,
        attributes: Vec<Attribute>,
    },
    GroupAdded {
        parent: NodeId,
        assigned: Option<NodeId>,
        attributes: Vec<Attribute>,
    },
    TransformAdded {
        parent: NodeId,
        assigned: Option<NodeId>,
        attributes: Vec<Attribute>,
        pose: Pose,
        stamp: TimeStamp,
    },
    UncertainTransformAdded {
        parent: NodeId,
        assigned: Option<NodeId>,
        attributes: Vec<Attribute>,
        pose: Pose,
        covariance: PoseCovariance,
        stamp: TimeStamp,
    },
    GeometryAdded {
        parent: NodeId,
        assigned: Option<NodeId>,
        attributes: Vec<Attribute>,
        shape: Shape,
        stamp: TimeStamp,
    },
    AttributesSet {
        id: NodeId,
        attributes: Vec<Attribute>,
        applied: bool,
    },
    TransformSet {
        id: NodeId,
        pose: Pose,
        stamp: TimeStamp,
        applied: bool,
    },
    UncertainTransformSet {
        id: NodeId,
        pose: Pose,
        covariance: PoseCovariance,
        stamp: TimeStamp,
        applied: bool,
    },
    NodeDeleted {
        id: NodeId,
        applied: bool,
    },
    ParentAdded {
        id: NodeId,
        parent: NodeId,
        applied: bool,
    },
    ParentRemoved {
        id: NodeId,
        parent: NodeId,
        applied: bool,
    },
}

impl GraphUpdate {
    /// Whether the mutation this update describes actually changed the graph.
    pub fn was_applied(&self) -> bool {
        match self {
            Self::NodeAdded { assigned, .. }
            | Self::GroupAdded { assigned, .. }
            | Self::TransformAdded { assigned, .. }
            | Self::UncertainTransformAdded { assigned, .. }
            | Self::GeometryAdded { assigned, .. } => assigned.is_some(),
            Self::AttributesSet { applied, .. }
            | Self::TransformSet { applied, .. }
            | Self::UncertainTransformSet { applied, .. }
            | Self::NodeDeleted { applied, .. }
            | Self::ParentAdded { applied, .. }
            | Self::ParentRemoved { applied, .. } => *applied,
        }
    }

    /// Short name of the mutation kind, used in logs and export labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeAdded { .. } => "node_added",
            Self::GroupAdded { .. } => "group_added",
            Self::TransformAdded { .. } => "transform_added",
            Self::UncertainTransformAdded { .. } => "uncertain_transform_added",
            Self::GeometryAdded { .. } => "geometry_added",
            Self::AttributesSet { .. } => "attributes_set",
            Self::TransformSet { .. } => "transform_set",
            Self::UncertainTransformSet { .. } => "uncertain_transform_set",
            Self::NodeDeleted { .. } => "node_deleted",
            Self::ParentAdded { .. } => "parent_added",
            Self::ParentRemoved { .. } => "parent_removed",
        }
    }
}

/// External consumer of graph mutations.
///
/// Called once per attempted mutation, in attachment order.  Must not call
/// back into the graph (the graph is mutably borrowed while observers run).
pub trait UpdateObserver {
    fn receive_update(&mut self, update: &GraphUpdate);
}

impl std::fmt::Debug for dyn UpdateObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn UpdateObserver")
    }
}

/// Token identifying an attached observer, handed out by
/// [`WorldGraph::attach_observer`][crate::WorldGraph::attach_observer] and
/// accepted by `detach_observer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_flag_follows_outcome() {
        let ok = GraphUpdate::GroupAdded {
            parent: NodeId::new(1),
            assigned: Some(NodeId::new(2)),
            attributes: vec![],
        };
        assert!(ok.was_applied());

        let rejected = GraphUpdate::GroupAdded {
            parent: NodeId::new(99),
            assigned: None,
            attributes: vec![],
        };
        assert!(!rejected.was_applied());

        let deleted = GraphUpdate::NodeDeleted {
            id: NodeId::new(3),
            applied: true,
        };
        assert!(deleted.was_applied());
    }

    #[test]
    fn update_serde_roundtrip() {
        let update = GraphUpdate::TransformSet {
            id: NodeId::new(5),
            pose: Pose::identity(),
            stamp: TimeStamp::from_secs(1.5),
            applied: true,
        };
        let json = serde_json::to_string(&update).unwrap();
        let back: GraphUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(update, back);
        assert_eq!(back.kind(), "transform_set");
    }
}
