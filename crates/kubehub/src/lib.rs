//! nodelist kubehub: lists `v1/Node` objects through kube-rs.
//!
//! The filter expression is passed to the API server as a label selector.
//! Kubernetes has no name-prefix query, so the prefix is matched here against
//! `metadata.name` while keeping the server's order.

#![forbid(unsafe_code)]

use std::time::Instant;

use anyhow::Context;
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::{Api, ListParams},
    Client,
};
use nodelist_core::{ListError, NodeList, NodeLister, NodeRecord, QueryMeta};
use tracing::{debug, info};

pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";
pub const REGION_LABEL: &str = "topology.kubernetes.io/region";
pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";

/// Well-known node pool labels of managed Kubernetes offerings, checked in order.
pub const DEFAULT_POOL_LABELS: [&str; 4] = [
    "cloud.google.com/gke-nodepool",
    "eks.amazonaws.com/nodegroup",
    "kubernetes.azure.com/agentpool",
    "karpenter.sh/nodepool",
];

fn label<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.metadata.labels.as_ref().and_then(|l| l.get(key)).map(|s| s.as_str())
}

fn node_address(node: &Node) -> String {
    let addrs = match node.status.as_ref().and_then(|s| s.addresses.as_ref()) {
        Some(a) => a,
        None => return String::new(),
    };
    addrs
        .iter()
        .find(|a| a.type_ == "InternalIP")
        .or_else(|| addrs.first())
        .map(|a| a.address.clone())
        .unwrap_or_default()
}

/// Project a Kubernetes node into a [`NodeRecord`].
pub fn record_from_node(node: &Node, pool_labels: &[String]) -> NodeRecord {
    NodeRecord {
        address: node_address(node),
        id: node.metadata.uid.clone().unwrap_or_default(),
        datacenter: label(node, ZONE_LABEL).or_else(|| label(node, REGION_LABEL)).unwrap_or_default().to_string(),
        name: node.metadata.name.clone().unwrap_or_default(),
        node_class: label(node, INSTANCE_TYPE_LABEL).unwrap_or_default().to_string(),
        node_pool: pool_labels.iter().find_map(|k| label(node, k)).unwrap_or_default().to_string(),
    }
}

/// Nodes whose name starts with `prefix`, in input order.
pub fn select_nodes(items: &[Node], prefix: &str, pool_labels: &[String]) -> Vec<NodeRecord> {
    items
        .iter()
        .filter(|n| n.metadata.name.as_deref().unwrap_or("").starts_with(prefix))
        .map(|n| record_from_node(n, pool_labels))
        .collect()
}

fn classify(err: kube::Error) -> ListError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => ListError::NotFound(resp.message),
        e => ListError::Other(anyhow::Error::new(e).context("listing v1/Node")),
    }
}

pub struct KubeNodeLister {
    client: Client,
    pool_labels: Vec<String>,
}

impl KubeNodeLister {
    pub fn new(client: Client) -> Self {
        Self { client, pool_labels: DEFAULT_POOL_LABELS.iter().map(|s| s.to_string()).collect() }
    }

    /// Build from the ambient kubeconfig / in-cluster environment.
    pub async fn try_default() -> anyhow::Result<Self> {
        let client = Client::try_default().await.context("creating kube client")?;
        info!("kube client ready");
        Ok(Self::new(client))
    }

    pub fn with_pool_labels(mut self, labels: Vec<String>) -> Self {
        self.pool_labels = labels;
        self
    }
}

#[async_trait::async_trait]
impl NodeLister for KubeNodeLister {
    async fn list_nodes(&self, prefix: &str, filter: &str) -> Result<NodeList, ListError> {
        let started = Instant::now();
        let api: Api<Node> = Api::all(self.client.clone());
        let mut lp = ListParams::default();
        if !filter.is_empty() {
            lp = lp.labels(filter);
        }
        let list = api.list(&lp).await.map_err(classify)?;
        let last_index = list.metadata.resource_version.as_deref().and_then(|rv| rv.parse::<u64>().ok()).unwrap_or(0);
        let nodes = select_nodes(&list.items, prefix, &self.pool_labels);
        debug!(listed = list.items.len(), selected = nodes.len(), last_index, "kube node list: ok");
        Ok(NodeList {
            nodes,
            meta: QueryMeta { last_index, known_leader: true, request_time: started.elapsed() },
        })
    }
}
