//! Node registry: `node_id -> {connection, location}` (§3, §4.3).
//!
//! Backed by a single `tokio::sync::RwLock<HashMap<..>>`: reads (lookups,
//! broadcast fan-out) take the read lock and run concurrently; registration
//! and removal take the write lock. This gives the reader-preferring
//! discipline §5 asks for without hand-rolling a lock.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;

/// A node's writable connection half, serialized so scheduler tasks never
/// interleave writes to the same socket (§5: "each connection's write side
/// is owned by a single scheduler task at a time").
pub type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Everything the broker knows about one registered node.
#[derive(Clone)]
pub struct NodeRecord {
    pub node_id: u64,
    pub x_km: f64,
    pub y_km: f64,
    pub writer: SharedWriter,
    reader_abort: AbortHandle,
}

impl NodeRecord {
    pub fn new(node_id: u64, x_km: f64, y_km: f64, writer: SharedWriter, reader_abort: AbortHandle) -> Self {
        Self {
            node_id,
            x_km,
            y_km,
            writer,
            reader_abort,
        }
    }

    pub fn distance_km(&self, other: &NodeRecord) -> f64 {
        let dx = self.x_km - other.x_km;
        let dy = self.y_km - other.y_km;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<u64, NodeRecord>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node_id`, replacing and closing any prior connection for
    /// that id (§4.3, §3 invariant: never two records for the same id).
    pub async fn register(&self, record: NodeRecord) {
        let mut guard = self.nodes.write().await;
        if let Some(prev) = guard.insert(record.node_id, record) {
            // Stop the previous reader task; its owned read half drops with
            // it. The previous writer half drops once any in-flight
            // deliveries referencing it finish.
            prev.reader_abort.abort();
        }
    }

    pub async fn lookup(&self, node_id: u64) -> Option<NodeRecord> {
        self.nodes.read().await.get(&node_id).cloned()
    }

    /// All registered nodes except `node_id`, for broadcast fan-out.
    pub async fn list_except(&self, node_id: u64) -> Vec<NodeRecord> {
        self.nodes
            .read()
            .await
            .values()
            .filter(|n| n.node_id != node_id)
            .cloned()
            .collect()
    }

    /// Remove `node_id`. Idempotent: removing an absent id is a no-op.
    pub async fn remove(&self, node_id: u64) {
        self.nodes.write().await.remove(&node_id);
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }
}
