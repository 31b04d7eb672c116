//! nodelist API: the node query resolver.
//!
//! One read derives the query identity, calls the listing backend once,
//! classifies the outcome and commits identity + projected nodes to the host.
//! Backends are injected; nothing here reaches for ambient configuration.

#![forbid(unsafe_code)]

use std::time::Instant;

use metrics::{counter, histogram};
use nodelist_core::{
    ConfigSource, ListError, NodeLister, NodeRecord, OutputSink, QueryIdentity, QueryMeta, QuerySpec, SinkError,
    NODES_FIELD,
};
use tracing::debug;

pub mod mock;

pub use mock::{MockLister, MockResponse};
pub use nodelist_core::prelude;

/// Read-path errors surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The listing backend failed for a reason other than "not found".
    #[error("error reading nodes: {0:#}")]
    Delegate(anyhow::Error),
    /// The host rejected the committed value.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Outcome of a successful read.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// `None` when the control plane reported the scope as not found.
    pub identity: Option<QueryIdentity>,
    pub nodes: Vec<NodeRecord>,
    pub meta: QueryMeta,
}

impl Resolution {
    fn absent() -> Self {
        Self::default()
    }

    pub fn is_absent(&self) -> bool {
        self.identity.is_none()
    }

    /// Identity as the host records it; `""` when absent.
    pub fn id(&self) -> &str {
        self.identity.as_ref().map(|i| i.as_str()).unwrap_or("")
    }

    /// The `nodes` value: one field-map per record, in order.
    pub fn nodes_value(&self) -> serde_json::Value {
        serde_json::Value::Array(self.nodes.iter().map(|n| serde_json::Value::Object(n.to_attributes())).collect())
    }

    /// Write this outcome to the host. An absent result only clears the id.
    pub fn commit<S: OutputSink + ?Sized>(&self, sink: &mut S) -> Result<(), SinkError> {
        match &self.identity {
            None => {
                sink.set_id("");
                Ok(())
            }
            Some(id) => {
                sink.set_id(id.as_str());
                sink.set(NODES_FIELD, self.nodes_value())
            }
        }
    }
}

/// Resolves node queries against an injected listing backend.
pub struct NodeQueryResolver<L> {
    lister: L,
}

impl<L: NodeLister> NodeQueryResolver<L> {
    pub fn new(lister: L) -> Self {
        Self { lister }
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    /// List nodes for `spec` and classify the outcome. Nothing is committed.
    pub async fn resolve(&self, spec: &QuerySpec) -> Result<Resolution, ReadError> {
        let t0 = Instant::now();
        let identity = QueryIdentity::derive(spec);
        debug!(%identity, "nodes: read start");
        counter!("nodes_read_total", 1);

        let res = match self.lister.list_nodes(&spec.prefix, &spec.filter).await {
            Ok(list) => Resolution { identity: Some(identity), nodes: list.nodes, meta: list.meta },
            Err(ListError::NotFound(reason)) => {
                counter!("nodes_read_not_found_total", 1);
                debug!(%reason, "nodes: scope not found, clearing identity");
                Resolution::absent()
            }
            Err(ListError::Other(e)) => {
                counter!("nodes_read_errors_total", 1);
                debug!(error = %e, took_ms = %t0.elapsed().as_millis(), "nodes: read failed");
                return Err(ReadError::Delegate(e));
            }
        };

        histogram!("nodes_read_ms", t0.elapsed().as_secs_f64() * 1000.0);
        debug!(
            count = res.nodes.len(),
            id = %res.id(),
            index = res.meta.last_index,
            request_ms = %res.meta.request_time.as_millis(),
            took_ms = %t0.elapsed().as_millis(),
            "nodes: read done"
        );
        Ok(res)
    }

    /// Full host read: query from `config`, resolve, commit to `sink`.
    pub async fn read<C, S>(&self, config: &C, sink: &mut S) -> Result<Resolution, ReadError>
    where
        C: ConfigSource + ?Sized,
        S: OutputSink + ?Sized,
    {
        let spec = QuerySpec::from_config(config);
        let res = self.resolve(&spec).await?;
        res.commit(sink)?;
        Ok(res)
    }
}
