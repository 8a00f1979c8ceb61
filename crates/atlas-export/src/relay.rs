//! Async update relay.
//!
//! Observers run synchronously inside the mutation, so anything slow (I/O,
//! network mirroring, a remote viewer) must not happen in the callback
//! itself.  [`UpdateRelay`] bridges the gap: it wraps each [`GraphUpdate`]
//! in an [`Envelope`] and publishes it on a [`tokio::sync::broadcast`]
//! channel, where any number of async consumers drain it at their own pace
//! without ever blocking the graph.
//!
//! Clone the [`RelayHandle`] before attaching the relay; the handle keeps
//! working after the relay itself is boxed into the graph.

use atlas_graph::{GraphUpdate, UpdateObserver};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default channel capacity (number of buffered envelopes before old ones
/// are dropped for slow consumers).
const DEFAULT_CAPACITY: usize = 256;

/// A [`GraphUpdate`] stamped for transport: unique id, wall-clock time and
/// the name of the graph it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub source: String,
    pub update: GraphUpdate,
}

/// Observer that forwards every update onto a broadcast channel.
#[derive(Debug)]
pub struct UpdateRelay {
    source: String,
    sender: broadcast::Sender<Envelope>,
}

impl UpdateRelay {
    /// Create a relay with the default channel capacity.
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_capacity(source, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(source: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            source: source.into(),
            sender,
        }
    }

    /// A handle for subscribing to the relay's channel.  Cheap to clone and
    /// valid for the lifetime of the relay, even after the relay has been
    /// handed to a graph.
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            sender: self.sender.clone(),
        }
    }
}

impl UpdateObserver for UpdateRelay {
    fn receive_update(&mut self, update: &GraphUpdate) {
        let envelope = Envelope {
            id: Uuid::new_v4(),
            at: Utc::now(),
            source: self.source.clone(),
            update: update.clone(),
        };
        // No subscribers is a normal condition; the envelope is simply
        // dropped and the mutation proceeds untouched.
        if self.sender.send(envelope).is_err() {
            debug!(source = %self.source, "no relay subscribers, envelope dropped");
        }
    }
}

/// Cloneable subscription point for an [`UpdateRelay`].
#[derive(Debug, Clone)]
pub struct RelayHandle {
    sender: broadcast::Sender<Envelope>,
}

impl RelayHandle {
    pub fn subscribe(&self) -> RelayReceiver {
        RelayReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Async consumer side of a relay subscription.
pub struct RelayReceiver {
    receiver: broadcast::Receiver<Envelope>,
}

impl RelayReceiver {
    /// Wait for the next envelope.
    ///
    /// Returns `None` once the relay has been dropped and the channel
    /// drained.  A consumer that falls behind loses the oldest envelopes
    /// and keeps going.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "relay receiver fell behind, envelopes dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_graph::WorldGraph;
    use atlas_types::{Attribute, NodeId};

    #[tokio::test]
    async fn relayed_envelopes_mirror_mutations_in_order() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let relay = UpdateRelay::new("atlas::test");
        let handle = relay.handle();
        let mut rx = handle.subscribe();
        graph.attach_observer(Box::new(relay));

        let group = graph
            .add_group(root, vec![Attribute::new("name", "sensors")], None)
            .unwrap();
        graph.delete_node(group).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.source, "atlas::test");
        assert_eq!(first.update.kind(), "group_added");
        assert!(first.update.was_applied());

        let second = rx.recv().await.unwrap();
        assert_eq!(second.update.kind(), "node_deleted");
        assert!(second.update.was_applied());
    }

    #[tokio::test]
    async fn rejected_attempts_are_relayed_too() {
        let mut graph = WorldGraph::new();
        let relay = UpdateRelay::new("atlas::test");
        let handle = relay.handle();
        let mut rx = handle.subscribe();
        graph.attach_observer(Box::new(relay));

        assert!(graph.delete_node(NodeId::new(404)).is_err());

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.update.kind(), "node_deleted");
        assert!(!envelope.update.was_applied());
    }

    #[tokio::test]
    async fn multiple_subscribers_see_the_same_envelope() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let relay = UpdateRelay::new("atlas::test");
        let handle = relay.handle();
        let mut rx1 = handle.subscribe();
        let mut rx2 = handle.subscribe();
        graph.attach_observer(Box::new(relay));

        graph.add_group(root, vec![], None).unwrap();

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.update, b.update);
    }

    /// Flooding a tiny channel while the consumer sleeps drops the oldest
    /// envelopes but keeps the stream alive.
    #[tokio::test]
    async fn slow_subscriber_skips_dropped_envelopes() {
        let mut graph = WorldGraph::new();
        let root = graph.root_id();
        let relay = UpdateRelay::with_capacity("atlas::test", 4);
        let handle = relay.handle();
        let mut rx = handle.subscribe();
        graph.attach_observer(Box::new(relay));

        for _ in 0..64 {
            graph.add_group(root, vec![], None).unwrap();
        }

        // The first recv rides over the Lagged error and yields one of the
        // surviving envelopes.
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.update.kind(), "group_added");
    }

    #[tokio::test]
    async fn receiver_ends_when_relay_is_dropped() {
        let relay = UpdateRelay::new("atlas::test");
        let handle = relay.handle();
        let mut rx = handle.subscribe();
        drop(relay);
        drop(handle);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn envelope_json_roundtrip() {
        let envelope = Envelope {
            id: Uuid::new_v4(),
            at: Utc::now(),
            source: "atlas::test".into(),
            update: GraphUpdate::NodeDeleted {
                id: NodeId::new(7),
                applied: true,
            },
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, envelope.id);
        assert_eq!(back.update, envelope.update);
    }
}
