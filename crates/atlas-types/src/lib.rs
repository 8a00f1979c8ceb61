//! `atlas-types` – shared value types of the AtlasWM world model.
//!
//! Everything that crosses a crate boundary lives here: node ids, semantic
//! attributes, the timestamp scalar used to index transform histories, the
//! geometric value types ([`geometry`]) and the global [`WorldError`]
//! taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod geometry;

/// Stable integer identifier of a world-model node.
///
/// Ids are minted exactly once by the graph's id generator (or forced by the
/// caller against its reservation pool) and never re-used for the lifetime of
/// a graph.  Components address nodes by `NodeId` only; no node references
/// cross the facade boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap a raw id value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable key/value tag attached to a node, e.g. `("name", "robot")`
/// or `("taskType", "sceneObject")`.  Used for semantic queries: a filter
/// matches a node when the node's attribute set is a superset of the filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    /// Create a new attribute tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.key, self.value)
    }
}

/// Monotonic scalar time value, in seconds, used to index transform
/// histories.
///
/// The scalar is a plain `f64`; ordering is total (`f64::total_cmp`), so
/// stamps can be sorted and binary-searched.  Use
/// [`TimeStamp::from_datetime`] or [`TimeStamp::now`] to derive stamps from
/// wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeStamp(f64);

impl TimeStamp {
    /// A stamp from a number of seconds.
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// The stamp as seconds.
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// A stamp from a wall-clock instant (seconds since the Unix epoch).
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_micros() as f64 / 1e6)
    }

    /// The current wall-clock time as a stamp.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// This stamp shifted by `secs` seconds (negative values shift into the
    /// past).
    pub fn offset(self, secs: f64) -> Self {
        Self(self.0 + secs)
    }
}

impl Eq for TimeStamp {}

impl PartialOrd for TimeStamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}s", self.0)
    }
}

/// Global error type for every fallible world-model operation.
///
/// All failures are reported to the direct caller as a typed result; none is
/// fatal to the process.  Internal consistency violations (e.g. a lookup
/// entry disagreeing with the node it points at) are programming errors and
/// are guarded by debug assertions instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The id does not resolve to a live node.
    #[error("no node with id {0}")]
    NotFound(NodeId),

    /// The operation requires a specific node variant which `id` is not
    /// (e.g. a group parent for an add, a transform for a pose query).
    #[error("node {id} is not a {expected}")]
    WrongKind {
        id: NodeId,
        expected: &'static str,
    },

    /// A forced id collides with a live node or an already-reserved id.
    #[error("id {0} is unavailable: already live or reserved")]
    IdUnavailable(NodeId),

    /// The root group is permanent: it can neither be deleted nor gain a
    /// parent.
    #[error("the root node cannot be deleted or re-parented")]
    CannotDeleteRoot,

    /// No ownership path exists from `reference` to `target` in the current
    /// graph.
    #[error("no ownership path from {reference} to {target}")]
    Disconnected {
        reference: NodeId,
        target: NodeId,
    },

    /// The transform history is empty or holds no sample at or before the
    /// queried stamp.
    #[error("transform {0} has no sample at or before the queried stamp")]
    NoData(NodeId),

    /// The observer token does not match any attached observer.
    #[error("observer is not attached")]
    ObserverNotFound,
}
