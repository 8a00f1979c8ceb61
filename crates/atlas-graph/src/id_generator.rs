//! Node id minting and reservation.
//!
//! Every node of a [`WorldGraph`][crate::WorldGraph] carries a unique
//! [`NodeId`].  Ids are either auto-generated ([`IdGenerator::next_id`]) or
//! forced by the caller, in which case they must first be claimed from the
//! generator's reservation pool ([`IdGenerator::reserve`]) so that no later
//! auto-generated id can alias them.

use std::collections::HashSet;

use atlas_types::NodeId;

/// The well-known id of the root group.
pub const ROOT_ID: NodeId = NodeId::new(1);

/// Produces unique node ids and manages the reservation pool for externally
/// forced ids.
///
/// Contract: [`next_id`][IdGenerator::next_id] never returns a value that was
/// previously issued or is currently reserved; no two live nodes of a graph
/// ever share an id.
pub trait IdGenerator {
    /// Mint the next unique id.
    fn next_id(&mut self) -> NodeId;

    /// Remove `id` from the pool of future auto-generated values.
    ///
    /// Returns `false` when the id cannot be claimed: it was already issued,
    /// already reserved, or is the root id.
    fn reserve(&mut self, id: NodeId) -> bool;

    /// The fixed, well-known root identifier.
    fn root_id(&self) -> NodeId;
}

/// [`IdGenerator`] backed by a running counter plus an explicit exclusion
/// pool for forced ids.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    /// Next candidate value for auto-generation.
    next: u64,
    /// Forced ids ahead of the counter; skipped (and reclaimed) when the
    /// counter reaches them.
    reserved: HashSet<u64>,
}

impl SequentialIdGenerator {
    /// Create a generator whose first auto-generated id follows the root id.
    pub fn new() -> Self {
        Self {
            next: ROOT_ID.get() + 1,
            reserved: HashSet::new(),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self) -> NodeId {
        loop {
            let candidate = self.next;
            self.next += 1;
            // A reserved value was handed out as a forced id earlier; skip it
            // and drop the bookkeeping entry.
            if !self.reserved.remove(&candidate) {
                return NodeId::new(candidate);
            }
        }
    }

    fn reserve(&mut self, id: NodeId) -> bool {
        let raw = id.get();
        if raw <= ROOT_ID.get() {
            // The root id (and anything below it) is never up for grabs.
            return false;
        }
        if raw < self.next {
            // Already issued by the counter.
            return false;
        }
        self.reserved.insert(raw)
    }

    fn root_id(&self) -> NodeId {
        ROOT_ID
    }
}
