//! Per-node and cluster-wide CPU and memory request accounting for
//! Kubernetes clusters.

pub mod aggregate;
pub mod collect;
pub mod quantity;
pub mod render;
pub mod source;

pub use aggregate::{ClusterTotals, NodeRecord, PodResourceUsage};
pub use collect::{collect, Error, Report};
pub use quantity::{parse_cpu, parse_memory, ParseError, ResourceQuantity};
pub use source::{
    ClusterSource, ContainerResourceSpec, FetchError, KubeSource, NodeInfo, PodInfo,
};
