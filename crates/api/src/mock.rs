//! Scripted in-memory listing backend for tests and dry runs.

use std::sync::Mutex;

use anyhow::anyhow;
use nodelist_core::{ListError, NodeList, NodeLister, NodeRecord};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Nodes(Vec<NodeRecord>),
    NotFound(String),
    Fail(String),
}

/// Answers every call with the same response and records the arguments.
pub struct MockLister {
    response: MockResponse,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockLister {
    pub fn new(response: MockResponse) -> Self {
        Self { response, calls: Mutex::new(Vec::new()) }
    }

    pub fn nodes(nodes: Vec<NodeRecord>) -> Self {
        Self::new(MockResponse::Nodes(nodes))
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(MockResponse::NotFound(reason.into()))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(MockResponse::Fail(message.into()))
    }

    /// `(prefix, filter)` of every call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl NodeLister for MockLister {
    async fn list_nodes(&self, prefix: &str, filter: &str) -> Result<NodeList, ListError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((prefix.to_string(), filter.to_string()));
        match &self.response {
            MockResponse::Nodes(nodes) => Ok(NodeList::new(nodes.clone())),
            MockResponse::NotFound(reason) => Err(ListError::NotFound(reason.clone())),
            MockResponse::Fail(message) => Err(ListError::Other(anyhow!("{}", message))),
        }
    }
}
