use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::{ClusterTotals, NodeRecord};
use crate::quantity::ParseError;
use crate::source::{ClusterSource, FetchError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to list nodes: {0}")]
    ListNodes(#[source] FetchError),
    #[error("failed to list pods on node {node}: {source}")]
    ListPods {
        node: String,
        #[source]
        source: FetchError,
    },
    #[error("invalid capacity on node {node}: {source}")]
    NodeCapacity {
        node: String,
        #[source]
        source: ParseError,
    },
    #[error("invalid resources in pod {pod} on node {node}: {source}")]
    PodResources {
        node: String,
        pod: String,
        #[source]
        source: ParseError,
    },
}

/// Aggregated requests of every node, in listing order, plus the cluster
/// totals.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub context: Option<String>,
    pub nodes: Vec<NodeRecord>,
    pub cluster: ClusterTotals,
}

/// Lists every node of `source` and folds in the pods scheduled on it.
///
/// Any fetch or parse failure aborts the whole collection.
pub async fn collect<S>(source: &S, context: Option<String>) -> Result<Report, Error>
where
    S: ClusterSource + ?Sized,
{
    let nodes = source.list_nodes().await.map_err(Error::ListNodes)?;
    info!(count = nodes.len(), "collecting node resources");

    let mut report = Report {
        context,
        nodes: Vec::with_capacity(nodes.len()),
        cluster: ClusterTotals::default(),
    };

    for node in nodes {
        let mut record = NodeRecord::new(
            node.name.as_str(),
            &node.allocatable_cpu,
            &node.allocatable_memory,
            &mut report.cluster,
        )
        .map_err(|source| Error::NodeCapacity {
            node: node.name.clone(),
            source,
        })?;

        let pods = source
            .list_pods(&node.name)
            .await
            .map_err(|source| Error::ListPods {
                node: node.name.clone(),
                source,
            })?;
        debug!(node = %node.name, pods = pods.len(), "aggregating pods");

        for pod in pods {
            record
                .record_pod(&mut report.cluster, &pod.name, &pod.containers)
                .map_err(|source| Error::PodResources {
                    node: node.name.clone(),
                    pod: pod.name.clone(),
                    source,
                })?;
        }

        report.nodes.push(record);
    }

    Ok(report)
}
