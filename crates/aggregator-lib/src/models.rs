//! Core data models for the metrics aggregator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity and address of a cluster node, as reported by the node source.
/// Immutable for the duration of one scrape cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: String,
    pub address: String,
    pub port: u16,
}

impl NodeRef {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.address, self.port)
    }
}

/// Identity of an entity tracked by the window store: a node, or one
/// container of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityKey {
    Node {
        name: String,
    },
    Container {
        namespace: String,
        pod: String,
        container: String,
    },
}

impl EntityKey {
    pub fn node(name: impl Into<String>) -> Self {
        EntityKey::Node { name: name.into() }
    }

    pub fn container(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        EntityKey::Container {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Node { name } => write!(f, "node/{}", name),
            EntityKey::Container {
                namespace,
                pod,
                container,
            } => write!(f, "container/{}/{}/{}", namespace, pod, container),
        }
    }
}

/// One timestamped resource measurement for an entity, produced once per
/// scrape. `cpu_usage_ns` is a monotonic counter of consumed CPU time;
/// `memory_working_set_bytes` is an instantaneous gauge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub entity: EntityKey,
    pub timestamp: DateTime<Utc>,
    pub cpu_usage_ns: u64,
    pub memory_working_set_bytes: u64,
}

/// Short-term usage rate derived from the two most recent samples of an
/// entity. CPU is expressed in nanocores (nanoseconds of CPU consumed per
/// second of wall clock); memory is the working set of the latest sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRate {
    pub cpu_nanocores: f64,
    pub memory_working_set_bytes: u64,
    pub window_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key_display() {
        assert_eq!(EntityKey::node("worker-1").to_string(), "node/worker-1");
        assert_eq!(
            EntityKey::container("default", "web-abc", "app").to_string(),
            "container/default/web-abc/app"
        );
    }

    #[test]
    fn test_entity_key_serializes_with_kind_tag() {
        let json = serde_json::to_value(EntityKey::node("worker-1")).unwrap();
        assert_eq!(json["kind"], "node");
        assert_eq!(json["name"], "worker-1");

        let json = serde_json::to_value(EntityKey::container("kube-system", "dns-x", "dns")).unwrap();
        assert_eq!(json["kind"], "container");
        assert_eq!(json["pod"], "dns-x");
    }

    #[test]
    fn test_node_ref_display() {
        let node = NodeRef::new("worker-1", "10.0.0.7", 10250);
        assert_eq!(node.to_string(), "worker-1 (10.0.0.7:10250)");
    }
}
