//! nodelist HTTP backend: lists nodes from a Nomad-style `/v1/nodes` API.

#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use nodelist_core::{ListError, NodeList, NodeLister, NodeRecord, QueryMeta};
use reqwest::{header::HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::debug;

pub mod config;

pub use config::ClientConfig;

const TOKEN_HEADER: &str = "X-Nomad-Token";
const INDEX_HEADER: &str = "x-nomad-index";
const KNOWN_LEADER_HEADER: &str = "x-nomad-knownleader";

/// Wire shape of one entry of `GET /v1/nodes`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeListStub {
    pub address: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub datacenter: String,
    pub name: String,
    pub node_class: String,
    pub node_pool: String,
}

impl From<NodeListStub> for NodeRecord {
    fn from(s: NodeListStub) -> Self {
        Self {
            address: s.address,
            id: s.id,
            datacenter: s.datacenter,
            name: s.name,
            node_class: s.node_class,
            node_pool: s.node_pool,
        }
    }
}

/// Body text for diagnostics; a failed read yields an empty string.
async fn body_text(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(body) => body.trim().to_string(),
        Err(e) => {
            debug!(error = %e, "node list: failed to read response body");
            String::new()
        }
    }
}

fn parse_meta(headers: &HeaderMap, request_time: Duration) -> QueryMeta {
    let header = |k: &str| headers.get(k).and_then(|v| v.to_str().ok());
    QueryMeta {
        last_index: header(INDEX_HEADER).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0),
        known_leader: header(KNOWN_LEADER_HEADER) == Some("true"),
        request_time,
    }
}

/// Listing backend speaking the HTTP node list API.
pub struct NomadLister {
    http: reqwest::Client,
    config: ClientConfig,
}

impl NomadLister {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn nodes_url(&self) -> String {
        format!("{}/v1/nodes", self.config.base_url())
    }
}

#[async_trait::async_trait]
impl NodeLister for NomadLister {
    async fn list_nodes(&self, prefix: &str, filter: &str) -> Result<NodeList, ListError> {
        let started = Instant::now();
        let url = self.nodes_url();
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(3);
        if !prefix.is_empty() {
            query.push(("prefix", prefix));
        }
        if !filter.is_empty() {
            query.push(("filter", filter));
        }
        if let Some(region) = self.config.region.as_deref() {
            query.push(("region", region));
        }

        let mut req = self.http.get(&url).query(&query);
        if let Some(token) = self.config.token.as_deref() {
            req = req.header(TOKEN_HEADER, token);
        }
        let resp = req.send().await.with_context(|| format!("GET {}", url))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            let body = body_text(resp).await;
            debug!(%url, "node list: not found");
            return Err(ListError::NotFound(format!("{} ({})", status, body)));
        }
        if !status.is_success() {
            let body = body_text(resp).await;
            return Err(anyhow!("Unexpected response code: {} ({})", status.as_u16(), body).into());
        }

        let meta = parse_meta(resp.headers(), started.elapsed());
        let stubs: Vec<NodeListStub> = resp.json().await.context("decoding node list response")?;
        debug!(count = stubs.len(), index = meta.last_index, took_ms = %started.elapsed().as_millis(), "node list: ok");
        Ok(NodeList { nodes: stubs.into_iter().map(NodeRecord::from).collect(), meta })
    }
}
