use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, ListParams};
use kube::config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Client, Config};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const NODE_SELECTOR: &str =
    "!node-role.kubernetes.io/master,!node-role.kubernetes.io/control-plane";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] KubeconfigError),
    #[error("failed to infer cluster config: {0}")]
    InferConfig(#[from] InferConfigError),
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error("node {node} does not report allocatable {resource}")]
    MissingCapacity {
        node: String,
        resource: &'static str,
    },
    #[error("object is missing {0}")]
    MissingMeta(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub allocatable_cpu: String,
    pub allocatable_memory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodInfo {
    /// `namespace/name`, unique across the cluster.
    pub name: String,
    pub containers: Vec<ContainerResourceSpec>,
}

/// The resource declarations of a single container, as written in the pod
/// spec. `None` means the value was not declared.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerResourceSpec {
    pub requested_cpu: Option<String>,
    pub requested_memory: Option<String>,
    pub limit_cpu: Option<String>,
    pub limit_memory: Option<String>,
}

/// Read access to the nodes of a cluster and the pods scheduled on them.
///
/// Implementations decide which nodes and pods are relevant: the aggregation
/// trusts whatever they return.
#[async_trait]
pub trait ClusterSource {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, FetchError>;

    async fn list_pods(&self, node_name: &str) -> Result<Vec<PodInfo>, FetchError>;
}

/// A [`ClusterSource`] backed by the Kubernetes API.
///
/// Control-plane nodes are skipped and only pods that are neither `Failed` nor
/// `Succeeded` are listed.
pub struct KubeSource {
    client: Client,
    context: Option<String>,
}

impl KubeSource {
    /// Connects using the named kubeconfig context, or infers the
    /// configuration (current context, then in-cluster) when none is given.
    pub async fn connect(context: Option<String>) -> Result<Self, FetchError> {
        let (config, context) = match context {
            Some(name) => {
                let options = KubeConfigOptions {
                    context: Some(name.clone()),
                    ..Default::default()
                };
                (Config::from_kubeconfig(&options).await?, Some(name))
            }
            None => {
                let current = Kubeconfig::read().ok().and_then(|k| k.current_context);
                (Config::infer().await?, current)
            }
        };
        debug!(cluster_url = %config.cluster_url, ?context, "connecting to cluster");

        let client = Client::try_from(config)?;
        Ok(KubeSource { client, context })
    }

    /// The kubeconfig context in use, when known.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

#[async_trait]
impl ClusterSource for KubeSource {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, FetchError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let node_list = nodes.list(&node_list_params()).await?;
        debug!(count = node_list.items.len(), "listed nodes");

        node_list.items.iter().map(node_info).collect()
    }

    async fn list_pods(&self, node_name: &str) -> Result<Vec<PodInfo>, FetchError> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let pod_list = pods.list(&pod_list_params(node_name)).await?;
        debug!(node = node_name, count = pod_list.items.len(), "listed pods");

        pod_list.items.iter().map(pod_info).collect()
    }
}

fn node_list_params() -> ListParams {
    ListParams::default().labels(NODE_SELECTOR)
}

fn pod_list_params(node_name: &str) -> ListParams {
    ListParams::default().fields(&format!(
        "spec.nodeName={node_name},status.phase!=Failed,status.phase!=Succeeded"
    ))
}

fn quantity(map: Option<&BTreeMap<String, Quantity>>, key: &str) -> Option<String> {
    map.and_then(|m| m.get(key)).map(|q| q.0.clone())
}

fn node_info(node: &Node) -> Result<NodeInfo, FetchError> {
    let name = node
        .metadata
        .name
        .clone()
        .ok_or(FetchError::MissingMeta("node name"))?;
    let status = node.status.as_ref();
    let allocatable = status.and_then(|s| s.allocatable.as_ref());
    let capacity = status.and_then(|s| s.capacity.as_ref());

    // allocatable is preferred, raw capacity is the fallback for nodes that
    // don't report it
    let lookup = |resource: &'static str| {
        quantity(allocatable, resource)
            .or_else(|| quantity(capacity, resource))
            .ok_or_else(|| FetchError::MissingCapacity {
                node: name.clone(),
                resource,
            })
    };

    Ok(NodeInfo {
        allocatable_cpu: lookup("cpu")?,
        allocatable_memory: lookup("memory")?,
        name,
    })
}

fn pod_info(pod: &Pod) -> Result<PodInfo, FetchError> {
    let name = pod
        .metadata
        .name
        .as_deref()
        .ok_or(FetchError::MissingMeta("pod name"))?;
    // pods are listed across namespaces, so the bare name is not unique
    let name = match pod.metadata.namespace.as_deref() {
        Some(namespace) => format!("{namespace}/{name}"),
        None => name.to_string(),
    };

    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.iter().map(container_spec).collect())
        .unwrap_or_default();

    Ok(PodInfo { name, containers })
}

fn container_spec(container: &Container) -> ContainerResourceSpec {
    let resources = container.resources.as_ref();
    let requests = resources.and_then(|r| r.requests.as_ref());
    let limits = resources.and_then(|r| r.limits.as_ref());

    ContainerResourceSpec {
        requested_cpu: quantity(requests, "cpu"),
        requested_memory: quantity(requests, "memory"),
        limit_cpu: quantity(limits, "cpu"),
        limit_memory: quantity(limits, "memory"),
    }
}
