//! Export surfaces for an [`atlas_graph::WorldGraph`].
//!
//! Two consumers of the observer protocol live here:
//!
//! | Module | Purpose |
//! |---|---|
//! | [`dot`] | Graphviz DOT snapshots of a subgraph, plus a change-tracking observer |
//! | [`relay`] | Async fan-out of [`atlas_graph::GraphUpdate`]s over a broadcast channel |

pub mod dot;
pub mod relay;

pub use dot::{DotExporter, DotObserver, render_dot};
pub use relay::{Envelope, RelayHandle, RelayReceiver, UpdateRelay};
