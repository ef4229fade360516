use std::collections::HashMap;

use async_trait::async_trait;
use kube_resources::{
    collect, ClusterSource, ClusterTotals, ContainerResourceSpec, Error, FetchError, NodeInfo,
    ParseError, PodInfo, ResourceQuantity,
};

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Default)]
struct StaticSource {
    nodes: Vec<NodeInfo>,
    pods: HashMap<String, Vec<PodInfo>>,
    broken_nodes: Vec<String>,
    fail_listing: bool,
}

impl StaticSource {
    fn node(mut self, name: &str, cpu: &str, memory: &str, pods: Vec<PodInfo>) -> Self {
        self.nodes.push(NodeInfo {
            name: name.to_string(),
            allocatable_cpu: cpu.to_string(),
            allocatable_memory: memory.to_string(),
        });
        self.pods.insert(name.to_string(), pods);
        self
    }
}

#[async_trait]
impl ClusterSource for StaticSource {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, FetchError> {
        if self.fail_listing {
            return Err(FetchError::MissingMeta("node name"));
        }
        Ok(self.nodes.clone())
    }

    async fn list_pods(&self, node_name: &str) -> Result<Vec<PodInfo>, FetchError> {
        if self.broken_nodes.iter().any(|n| n == node_name) {
            return Err(FetchError::MissingMeta("pod name"));
        }
        Ok(self.pods.get(node_name).cloned().unwrap_or_default())
    }
}

fn pod(name: &str, containers: Vec<ContainerResourceSpec>) -> PodInfo {
    PodInfo {
        name: name.to_string(),
        containers,
    }
}

fn requests(
    cpu: Option<&str>,
    memory: Option<&str>,
    limit_cpu: Option<&str>,
) -> ContainerResourceSpec {
    ContainerResourceSpec {
        requested_cpu: cpu.map(String::from),
        requested_memory: memory.map(String::from),
        limit_cpu: limit_cpu.map(String::from),
        limit_memory: None,
    }
}

fn q(value: u64) -> ResourceQuantity {
    ResourceQuantity::new(value)
}

#[tokio::test]
async fn test_single_node_report() {
    let source = StaticSource::default().node(
        "worker-1",
        "4",
        "8Gi",
        vec![
            pod("pod-a", vec![requests(Some("500m"), Some("256Mi"), Some("1"))]),
            pod("pod-b", vec![requests(Some("250m"), None, None)]),
        ],
    );

    let report = collect(&source, None).await.unwrap();

    assert_eq!(report.nodes.len(), 1);
    let node = &report.nodes[0];
    assert_eq!(node.name(), "worker-1");
    assert_eq!(node.total_cpu_requests(), q(750));
    assert_eq!(node.total_mem_requests(), q(268435456));
    assert_eq!(node.total_cpu_limits(), q(1000));
    assert_eq!(node.cpu_capacity(), q(4000));
    assert_eq!(node.mem_capacity(), q(8 * GIB));
    assert_eq!(report.cluster, node.totals());
}

#[tokio::test]
async fn test_cluster_totals_span_nodes() {
    let source = StaticSource::default()
        .node(
            "worker-1",
            "4",
            "8Gi",
            vec![pod("web-0", vec![requests(Some("1"), Some("1Gi"), Some("2"))])],
        )
        .node(
            "worker-2",
            "3920m",
            "16283852Ki",
            vec![
                pod(
                    "db-0",
                    vec![
                        requests(Some("1500m"), Some("4Gi"), None),
                        requests(Some("100m"), Some("128Mi"), Some("200m")),
                    ],
                ),
                pod("bare", vec![ContainerResourceSpec::default()]),
            ],
        )
        .node("worker-3", "2", "4G", vec![]);

    let report = collect(&source, Some("prod".to_string())).await.unwrap();

    let names: Vec<_> = report.nodes.iter().map(|n| n.name()).collect();
    assert_eq!(names, ["worker-1", "worker-2", "worker-3"]);
    assert_eq!(report.context.as_deref(), Some("prod"));
    assert_eq!(
        report.cluster,
        ClusterTotals {
            cpu_capacity: q(4000 + 3920 + 2000),
            mem_capacity: q(8 * GIB + 16283852 * 1024 + 4_000_000_000),
            cpu_requests: q(1000 + 1600),
            mem_requests: q(GIB + 4 * GIB + 128 * 1024 * 1024),
            cpu_limits: q(2000 + 200),
        }
    );
    assert_eq!(report.cluster, ClusterTotals::from_nodes(&report.nodes).unwrap());
}

#[tokio::test]
async fn test_empty_cluster() {
    let report = collect(&StaticSource::default(), None).await.unwrap();

    assert!(report.nodes.is_empty());
    assert_eq!(report.cluster, ClusterTotals::default());
}

#[tokio::test]
async fn test_node_listing_failure() {
    let source = StaticSource {
        fail_listing: true,
        ..Default::default()
    };

    assert!(matches!(
        collect(&source, None).await,
        Err(Error::ListNodes(_))
    ));
}

#[tokio::test]
async fn test_pod_listing_failure_names_node() {
    let mut source = StaticSource::default()
        .node("worker-1", "4", "8Gi", vec![])
        .node("worker-2", "4", "8Gi", vec![]);
    source.broken_nodes.push("worker-2".to_string());

    match collect(&source, None).await {
        Err(Error::ListPods { node, .. }) => assert_eq!(node, "worker-2"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_pod_quantity_aborts() {
    let source = StaticSource::default().node(
        "worker-1",
        "4",
        "8Gi",
        vec![pod("web-0", vec![requests(Some("0.5"), None, None)])],
    );

    match collect(&source, None).await {
        Err(Error::PodResources { node, pod, source }) => {
            assert_eq!(node, "worker-1");
            assert_eq!(pod, "web-0");
            assert_eq!(source, ParseError::InvalidCpu("0.5".to_string()));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_capacity_aborts() {
    let source = StaticSource::default().node("worker-1", "4", "lots", vec![]);

    assert!(matches!(
        collect(&source, None).await,
        Err(Error::NodeCapacity { .. })
    ));
}
