//! Wire schema of the node agent's usage summary document
//!
//! The schema is owned by the node agent; this module treats it as an opaque
//! parse target. Counter blocks are optional on the wire, and entities with
//! missing counters are skipped during decoding rather than failing the
//! whole scrape.

use crate::models::{EntityKey, NodeRef, Sample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level summary document returned by a node agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub node: NodeStats,
    #[serde(default)]
    pub pods: Vec<PodStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStats {
    #[serde(rename = "nodeName")]
    pub node_name: String,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodStats {
    #[serde(rename = "podRef")]
    pub pod_ref: PodReference,
    #[serde(default)]
    pub containers: Vec<ContainerStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodReference {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStats {
    pub name: String,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuStats {
    pub time: DateTime<Utc>,
    #[serde(rename = "usageCoreNanoSeconds")]
    pub usage_core_nano_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub time: DateTime<Utc>,
    #[serde(rename = "workingSetBytes")]
    pub working_set_bytes: Option<u64>,
}

impl Summary {
    /// Decode the document into samples for the node and each of its pods'
    /// containers. The CPU counter timestamp is the sample point; entities
    /// missing either counter are dropped with a debug log.
    pub fn into_samples(self, node: &NodeRef) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(1 + self.pods.len());

        let node_key = EntityKey::node(&node.name);
        match decode_point(&self.node.cpu, &self.node.memory) {
            Some((timestamp, cpu_usage_ns, memory_working_set_bytes)) => {
                samples.push(Sample {
                    entity: node_key,
                    timestamp,
                    cpu_usage_ns,
                    memory_working_set_bytes,
                });
            }
            None => {
                debug!(entity = %node_key, "Summary is missing node-level counters, skipping");
            }
        }

        for pod in self.pods {
            for container in pod.containers {
                let key = EntityKey::container(
                    &pod.pod_ref.namespace,
                    &pod.pod_ref.name,
                    &container.name,
                );
                match decode_point(&container.cpu, &container.memory) {
                    Some((timestamp, cpu_usage_ns, memory_working_set_bytes)) => {
                        samples.push(Sample {
                            entity: key,
                            timestamp,
                            cpu_usage_ns,
                            memory_working_set_bytes,
                        });
                    }
                    None => {
                        debug!(entity = %key, "Summary is missing container counters, skipping");
                    }
                }
            }
        }

        samples
    }
}

/// Extract (timestamp, cpu counter, working set) from one entity's counter
/// blocks, or None if either counter is absent.
fn decode_point(
    cpu: &Option<CpuStats>,
    memory: &Option<MemoryStats>,
) -> Option<(DateTime<Utc>, u64, u64)> {
    let cpu = cpu.as_ref()?;
    let memory = memory.as_ref()?;
    Some((
        cpu.time,
        cpu.usage_core_nano_seconds?,
        memory.working_set_bytes?,
    ))
}
