//! Node membership source
//!
//! The aggregator never discovers nodes itself; it consumes a membership
//! source that can be snapshotted once per refresh tick. The source also
//! reports a one-shot initial-sync signal so the first scrape never runs
//! against an incomplete node list.

use crate::models::NodeRef;
use async_trait::async_trait;

/// Source of the current cluster node set.
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// Snapshot of the nodes known right now. Called fresh on every tick;
    /// the returned list is treated as immutable for that tick.
    async fn list_nodes(&self) -> Vec<NodeRef>;

    /// True once the initial membership sync has completed. One-shot: once
    /// true it stays true for the process lifetime.
    fn has_synced(&self) -> bool;
}

/// Fixed node membership supplied by configuration. Synced from the start;
/// used for standalone deployments and as the default wiring in the binary.
pub struct StaticNodeSource {
    nodes: Vec<NodeRef>,
}

impl StaticNodeSource {
    pub fn new(nodes: Vec<NodeRef>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeSource for StaticNodeSource {
    async fn list_nodes(&self) -> Vec<NodeRef> {
        self.nodes.clone()
    }

    fn has_synced(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_is_synced_immediately() {
        let source = StaticNodeSource::new(vec![NodeRef::new("worker-1", "10.0.0.7", 10250)]);

        assert!(source.has_synced());
        let nodes = source.list_nodes().await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "worker-1");
    }

    #[tokio::test]
    async fn test_static_source_empty() {
        let source = StaticNodeSource::new(Vec::new());
        assert!(source.has_synced());
        assert!(source.list_nodes().await.is_empty());
    }
}
