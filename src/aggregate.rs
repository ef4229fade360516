use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::quantity::{parse_cpu, parse_memory, ParseError, ResourceQuantity};
use crate::source::ContainerResourceSpec;

fn add(
    total: ResourceQuantity,
    value: ResourceQuantity,
    what: &'static str,
) -> Result<ResourceQuantity, ParseError> {
    total
        .checked_add(value)
        .ok_or(ParseError::TotalOutOfRange(what))
}

/// Requests and limits of one pod, summed over its containers.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PodResourceUsage {
    pub name: String,
    pub cpu_requests: ResourceQuantity,
    pub mem_requests: ResourceQuantity,
    pub cpu_limits: ResourceQuantity,
}

impl PodResourceUsage {
    /// Sums the declared requests and CPU limit of `containers`. Undeclared
    /// values count as zero; a malformed value or an overflowing sum fails the
    /// whole pod.
    pub fn from_containers(
        name: impl Into<String>,
        containers: &[ContainerResourceSpec],
    ) -> Result<Self, ParseError> {
        let mut usage = PodResourceUsage {
            name: name.into(),
            ..Default::default()
        };

        for container in containers {
            if let Some(cpu) = &container.requested_cpu {
                usage.cpu_requests = add(usage.cpu_requests, parse_cpu(cpu)?, "cpu requests")?;
            }
            if let Some(memory) = &container.requested_memory {
                usage.mem_requests =
                    add(usage.mem_requests, parse_memory(memory)?, "memory requests")?;
            }
            if let Some(cpu) = &container.limit_cpu {
                usage.cpu_limits = add(usage.cpu_limits, parse_cpu(cpu)?, "cpu limits")?;
            }
        }

        Ok(usage)
    }
}

/// Running totals across every node of the cluster.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterTotals {
    pub cpu_capacity: ResourceQuantity,
    pub mem_capacity: ResourceQuantity,
    pub cpu_requests: ResourceQuantity,
    pub mem_requests: ResourceQuantity,
    pub cpu_limits: ResourceQuantity,
}

impl ClusterTotals {
    /// Recomputes the totals of a set of independently built node records.
    pub fn from_nodes<'a>(
        nodes: impl IntoIterator<Item = &'a NodeRecord>,
    ) -> Result<Self, ParseError> {
        nodes
            .into_iter()
            .try_fold(ClusterTotals::default(), |totals, node| {
                totals.merge(&node.totals())
            })
    }

    /// Field-wise sum of two sets of totals.
    pub fn merge(&self, other: &ClusterTotals) -> Result<ClusterTotals, ParseError> {
        Ok(ClusterTotals {
            cpu_capacity: add(self.cpu_capacity, other.cpu_capacity, "cpu capacity")?,
            mem_capacity: add(self.mem_capacity, other.mem_capacity, "memory capacity")?,
            cpu_requests: add(self.cpu_requests, other.cpu_requests, "cpu requests")?,
            mem_requests: add(self.mem_requests, other.mem_requests, "memory requests")?,
            cpu_limits: add(self.cpu_limits, other.cpu_limits, "cpu limits")?,
        })
    }

    fn with_pod(&self, usage: &PodResourceUsage) -> Result<ClusterTotals, ParseError> {
        self.merge(&ClusterTotals {
            cpu_requests: usage.cpu_requests,
            mem_requests: usage.mem_requests,
            cpu_limits: usage.cpu_limits,
            ..Default::default()
        })
    }

    // `usage` must already be part of these totals
    fn without_pod(&self, usage: &PodResourceUsage) -> ClusterTotals {
        ClusterTotals {
            cpu_requests: self.cpu_requests - usage.cpu_requests,
            mem_requests: self.mem_requests - usage.mem_requests,
            cpu_limits: self.cpu_limits - usage.cpu_limits,
            ..*self
        }
    }
}

/// Capacity of a node and the requests of the pods scheduled on it.
///
/// `total_*` always equal the sums over `pods`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    name: String,
    cpu_capacity: ResourceQuantity,
    mem_capacity: ResourceQuantity,
    pods: BTreeMap<String, PodResourceUsage>,
    total_cpu_requests: ResourceQuantity,
    total_mem_requests: ResourceQuantity,
    total_cpu_limits: ResourceQuantity,
}

impl NodeRecord {
    /// Parses the node's allocatable capacity and adds it to `cluster`.
    ///
    /// `cluster` is left unchanged on error.
    pub fn new(
        name: impl Into<String>,
        allocatable_cpu: &str,
        allocatable_memory: &str,
        cluster: &mut ClusterTotals,
    ) -> Result<Self, ParseError> {
        let cpu_capacity = parse_cpu(allocatable_cpu)?;
        let mem_capacity = parse_memory(allocatable_memory)?;

        *cluster = cluster.merge(&ClusterTotals {
            cpu_capacity,
            mem_capacity,
            ..Default::default()
        })?;

        Ok(NodeRecord {
            name: name.into(),
            cpu_capacity,
            mem_capacity,
            pods: BTreeMap::new(),
            total_cpu_requests: ResourceQuantity::ZERO,
            total_mem_requests: ResourceQuantity::ZERO,
            total_cpu_limits: ResourceQuantity::ZERO,
        })
    }

    /// Adds a pod to the node, updating the node and cluster totals.
    ///
    /// Nothing is modified on error. Recording a pod name a second time
    /// replaces the earlier entry.
    pub fn record_pod(
        &mut self,
        cluster: &mut ClusterTotals,
        pod_name: &str,
        containers: &[ContainerResourceSpec],
    ) -> Result<&PodResourceUsage, ParseError> {
        let usage = PodResourceUsage::from_containers(pod_name, containers)?;
        trace!(
            node = %self.name,
            pod = pod_name,
            cpu = %usage.cpu_requests,
            memory = %usage.mem_requests,
            cpu_limit = %usage.cpu_limits,
            "recording pod"
        );

        let (node_totals, cluster_totals) = match self.pods.get(pod_name) {
            Some(previous) => (
                self.totals().without_pod(previous),
                cluster.without_pod(previous),
            ),
            None => (self.totals(), *cluster),
        };
        let node_totals = node_totals.with_pod(&usage)?;
        let cluster_totals = cluster_totals.with_pod(&usage)?;

        self.total_cpu_requests = node_totals.cpu_requests;
        self.total_mem_requests = node_totals.mem_requests;
        self.total_cpu_limits = node_totals.cpu_limits;
        *cluster = cluster_totals;

        self.pods.insert(pod_name.to_string(), usage);
        Ok(&self.pods[pod_name])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cpu_capacity(&self) -> ResourceQuantity {
        self.cpu_capacity
    }

    pub fn mem_capacity(&self) -> ResourceQuantity {
        self.mem_capacity
    }

    pub fn total_cpu_requests(&self) -> ResourceQuantity {
        self.total_cpu_requests
    }

    pub fn total_mem_requests(&self) -> ResourceQuantity {
        self.total_mem_requests
    }

    pub fn total_cpu_limits(&self) -> ResourceQuantity {
        self.total_cpu_limits
    }

    pub fn pod(&self, name: &str) -> Option<&PodResourceUsage> {
        self.pods.get(name)
    }

    /// Pods recorded on this node, ordered by name.
    pub fn pods(&self) -> impl Iterator<Item = &PodResourceUsage> {
        self.pods.values()
    }

    /// This node's contribution to the cluster totals.
    pub fn totals(&self) -> ClusterTotals {
        ClusterTotals {
            cpu_capacity: self.cpu_capacity,
            mem_capacity: self.mem_capacity,
            cpu_requests: self.total_cpu_requests,
            mem_requests: self.total_mem_requests,
            cpu_limits: self.total_cpu_limits,
        }
    }
}
