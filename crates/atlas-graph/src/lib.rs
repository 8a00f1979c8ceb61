//! `atlas-graph` – the AtlasWM world-model core.
//!
//! A live, mutable spatial-temporal world model for robotic software: a
//! shared in-memory DAG of coordinate frames, time-indexed rigid transforms
//! (with optional uncertainty) and geometric payloads.  Nodes are addressed
//! by stable integer ids; no references cross the facade boundary.
//!
//! # Modules
//!
//! - [`graph`] – [`WorldGraph`]: the facade owning the node arena, the root
//!   group, the id generator and the observer list; every query and
//!   mutation goes through it.
//! - [`node`] – the closed set of node variants (leaf, group, transform,
//!   uncertain transform, geometry) and the sorted transform histories.
//! - [`id_generator`] – [`IdGenerator`] contract and the sequential
//!   counter-plus-pool implementation.
//! - [`observer`] – [`GraphUpdate`] mutation events and the
//!   [`UpdateObserver`] fan-out contract.
//! - [`visitor`] – [`NodeVisitor`] traversal capability with the shipped
//!   attribute finder and statistics visitors.
//!
//! # Example
//!
//! ```rust
//! use atlas_graph::WorldGraph;
//! use atlas_types::geometry::{Pose, Vec3};
//! use atlas_types::{Attribute, TimeStamp};
//!
//! let mut world = WorldGraph::new();
//! let root = world.root_id();
//!
//! let base = world
//!     .add_transform(
//!         root,
//!         vec![Attribute::new("name", "robot_base")],
//!         Pose::from_translation(Vec3::new(1.0, 0.0, 0.0)),
//!         TimeStamp::from_secs(0.0),
//!         None,
//!     )
//!     .unwrap();
//!
//! let pose = world
//!     .transform_between(base, root, TimeStamp::from_secs(1.0))
//!     .unwrap();
//! assert!((pose.translation.x - 1.0).abs() < 1e-5);
//! ```

pub mod graph;
pub mod id_generator;
pub mod node;
pub mod observer;
pub mod visitor;

pub use graph::WorldGraph;
pub use id_generator::{IdGenerator, ROOT_ID, SequentialIdGenerator};
pub use node::{Node, NodeKind, TransformHistory, UncertainHistory};
pub use observer::{GraphUpdate, ObserverId, UpdateObserver};
pub use visitor::{AttributeFinder, NodeTally, NodeVisitor, Tally};
