//! nodelist core types: query shape, node records and the two collaborator
//! contracts (listing backend + host sink).

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod identity;

pub use identity::QueryIdentity;

/// Names of the attributes committed for every node, in commit order.
pub const NODE_ATTRIBUTES: [&str; 6] = ["address", "id", "datacenter", "name", "node_class", "node_pool"];

/// Field the projected node list is committed under.
pub const NODES_FIELD: &str = "nodes";

/// Query shape for one read. Empty strings mean "unconstrained".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct QuerySpec {
    pub prefix: String,
    pub filter: String,
}

impl QuerySpec {
    pub fn new(prefix: impl Into<String>, filter: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), filter: filter.into() }
    }

    /// Build a spec from the host configuration; missing fields are empty.
    pub fn from_config<C: ConfigSource + ?Sized>(config: &C) -> Self {
        Self {
            prefix: config.get("prefix").unwrap_or_default(),
            filter: config.get("filter").unwrap_or_default(),
        }
    }
}

/// One worker node as reported by the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeRecord {
    pub address: String,
    pub id: String,
    pub datacenter: String,
    pub name: String,
    pub node_class: String,
    pub node_pool: String,
}

impl NodeRecord {
    /// Field-map with exactly the six [`NODE_ATTRIBUTES`].
    pub fn to_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        use serde_json::Value;
        let mut m = serde_json::Map::with_capacity(NODE_ATTRIBUTES.len());
        m.insert("address".into(), Value::String(self.address.clone()));
        m.insert("id".into(), Value::String(self.id.clone()));
        m.insert("datacenter".into(), Value::String(self.datacenter.clone()));
        m.insert("name".into(), Value::String(self.name.clone()));
        m.insert("node_class".into(), Value::String(self.node_class.clone()));
        m.insert("node_pool".into(), Value::String(self.node_pool.clone()));
        m
    }
}

/// Response metadata from the control plane. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// Control-plane index the answer was served at (0 when unknown).
    pub last_index: u64,
    pub known_leader: bool,
    pub request_time: Duration,
}

/// Result of a successful list call, records in control-plane order.
#[derive(Debug, Clone, Default)]
pub struct NodeList {
    pub nodes: Vec<NodeRecord>,
    pub meta: QueryMeta,
}

impl NodeList {
    pub fn new(nodes: Vec<NodeRecord>) -> Self {
        Self { nodes, meta: QueryMeta::default() }
    }
}

/// Failure of a list call.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// The queried scope has no resource. Not a failure for readers.
    #[error("not found: {0}")]
    NotFound(String),
    /// Transport, auth, malformed filter, anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ListError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ListError::NotFound(_))
    }
}

/// Listing collaborator: the control plane's node list API.
#[async_trait::async_trait]
pub trait NodeLister: Send + Sync {
    async fn list_nodes(&self, prefix: &str, filter: &str) -> Result<NodeList, ListError>;
}

#[async_trait::async_trait]
impl<T: NodeLister + ?Sized> NodeLister for Box<T> {
    async fn list_nodes(&self, prefix: &str, filter: &str) -> Result<NodeList, ListError> {
        (**self).list_nodes(prefix, filter).await
    }
}

#[async_trait::async_trait]
impl<T: NodeLister + ?Sized> NodeLister for std::sync::Arc<T> {
    async fn list_nodes(&self, prefix: &str, filter: &str) -> Result<NodeList, ListError> {
        (**self).list_nodes(prefix, filter).await
    }
}

/// Read side of the host record.
pub trait ConfigSource {
    fn get(&self, field: &str) -> Option<String>;
}

/// Rejection of a value written to the host record.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("field {0} is not computed and cannot be set")]
    NotComputed(String),
    #[error("{field}: expected {expected}, got {got}")]
    TypeMismatch { field: String, expected: String, got: String },
}

/// Write side of the host record.
pub trait OutputSink {
    /// Record the existence identity; `""` marks the resource absent.
    fn set_id(&mut self, id: &str);
    fn set(&mut self, field: &str, value: serde_json::Value) -> Result<(), SinkError>;
}

pub mod prelude {
    pub use super::{
        ConfigSource, ListError, NodeList, NodeLister, NodeRecord, OutputSink, QueryIdentity, QueryMeta, QuerySpec,
        SinkError,
    };
}
