#![forbid(unsafe_code)]

use nodelist_api::{MockLister, NodeQueryResolver, ReadError};
use nodelist_core::{ListError, NodeList, NodeLister, NodeRecord, OutputSink, QueryIdentity, QuerySpec, SinkError};
use nodelist_schema::{nodes_schema, ResourceData};

fn rec(n: u8) -> NodeRecord {
    NodeRecord {
        address: format!("10.0.0.{}", n),
        id: format!("00000000-0000-0000-0000-{:012}", n),
        datacenter: if n % 2 == 0 { "dc2".into() } else { "dc1".into() },
        name: format!("tf-nomad-test-{}", n),
        node_class: "compute".into(),
        node_pool: "default".into(),
    }
}

fn data(prefix: &str, filter: &str) -> ResourceData {
    let mut rd = ResourceData::new(nodes_schema());
    if !prefix.is_empty() {
        rd = rd.with_config("prefix", prefix).expect("prefix");
    }
    if !filter.is_empty() {
        rd = rd.with_config("filter", filter).expect("filter");
    }
    rd
}

/// Sink that counts every write and can refuse `set`.
#[derive(Default)]
struct CountingSink {
    id_writes: usize,
    set_writes: usize,
    refuse: bool,
}

impl OutputSink for CountingSink {
    fn set_id(&mut self, _id: &str) {
        self.id_writes += 1;
    }

    fn set(&mut self, field: &str, _value: serde_json::Value) -> Result<(), SinkError> {
        self.set_writes += 1;
        if self.refuse {
            return Err(SinkError::TypeMismatch { field: field.to_string(), expected: "set".into(), got: "list".into() });
        }
        Ok(())
    }
}

#[tokio::test]
async fn scenario_a_unconstrained_lists_everything() {
    let resolver = NodeQueryResolver::new(MockLister::nodes(vec![rec(1), rec(2), rec(3)]));
    let mut rd = data("", "");
    let res = resolver.read(&rd.clone(), &mut rd).await.expect("read");

    assert_eq!(res.nodes.len(), 3);
    assert_eq!(rd.id(), QueryIdentity::derive(&QuerySpec::new("", "")).as_str());
    assert_eq!(rd.id(), "0");
    assert_eq!(rd.get_state("nodes").and_then(|v| v.as_array()).map(|a| a.len()), Some(3));
    assert_eq!(resolver.lister().calls(), vec![(String::new(), String::new())]);
}

#[tokio::test]
async fn scenario_b_prefix_record_is_copied_verbatim() {
    let node = rec(7);
    let resolver = NodeQueryResolver::new(MockLister::nodes(vec![node.clone()]));
    let mut rd = data("tf-nomad-test-xyz", "");
    resolver.read(&rd.clone(), &mut rd).await.expect("read");

    let nodes = rd.get_state("nodes").and_then(|v| v.as_array()).cloned().expect("nodes");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0], serde_json::Value::Object(node.to_attributes()));
    assert_eq!(rd.id(), "343888140");
    assert_eq!(resolver.lister().calls(), vec![("tf-nomad-test-xyz".to_string(), String::new())]);
}

#[tokio::test]
async fn scenario_c_empty_filter_result_keeps_identity() {
    let filter = "Meta.test == \"nonexistent\"";
    let resolver = NodeQueryResolver::new(MockLister::nodes(vec![]));
    let mut rd = data("", filter);
    let res = resolver.read(&rd.clone(), &mut rd).await.expect("read");

    assert!(res.nodes.is_empty());
    assert!(!res.is_absent());
    assert_eq!(rd.id(), QueryIdentity::derive(&QuerySpec::new("", filter)).as_str());
    assert_eq!(rd.get_state("nodes"), Some(&serde_json::json!([])));
}

#[tokio::test]
async fn scenario_d_not_found_clears_identity() {
    let resolver = NodeQueryResolver::new(MockLister::not_found("Unexpected response code: 404"));
    let mut rd = data("x", "y");
    rd.set_id("stale");
    let res = resolver.read(&rd.clone(), &mut rd).await.expect("not found is not an error");

    assert!(res.is_absent());
    assert!(res.nodes.is_empty());
    assert_eq!(rd.id(), "");
    assert!(rd.get_state("nodes").is_none());
}

#[tokio::test]
async fn scenario_e_transport_failure_surfaces_cause_and_writes_nothing() {
    let cause = "Get \"http://127.0.0.1:4646/v1/nodes\": dial tcp 127.0.0.1:4646: connect: connection timed out";
    let resolver = NodeQueryResolver::new(MockLister::failing(cause));
    let cfg = data("", "");
    let mut sink = CountingSink::default();
    let err = resolver.read(&cfg, &mut sink).await.unwrap_err();

    assert!(matches!(err, ReadError::Delegate(_)));
    let msg = err.to_string();
    assert!(msg.starts_with("error reading nodes"), "{}", msg);
    assert!(msg.contains(cause), "{}", msg);
    assert_eq!(sink.id_writes, 0);
    assert_eq!(sink.set_writes, 0);
}

#[tokio::test]
async fn not_found_text_in_other_errors_is_still_fatal() {
    let resolver = NodeQueryResolver::new(MockLister::failing("proxy said 404 but the listing is unavailable"));
    let err = resolver.resolve(&QuerySpec::default()).await.unwrap_err();
    assert!(matches!(err, ReadError::Delegate(_)));
}

#[tokio::test]
async fn sink_failure_is_propagated_unchanged() {
    let resolver = NodeQueryResolver::new(MockLister::nodes(vec![rec(1)]));
    let mut sink = CountingSink { refuse: true, ..Default::default() };
    let err = resolver.read(&data("", ""), &mut sink).await.unwrap_err();
    match err {
        ReadError::Sink(SinkError::TypeMismatch { field, .. }) => assert_eq!(field, "nodes"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(sink.id_writes, 1);
}

#[tokio::test]
async fn identity_is_deterministic_across_reads() {
    let resolver = NodeQueryResolver::new(MockLister::nodes(vec![rec(1)]));
    let spec = QuerySpec::new("web-", "Meta.rack == \"r1\"");
    let a = resolver.resolve(&spec).await.expect("first");
    let b = resolver.resolve(&spec).await.expect("second");
    assert_eq!(a.identity, b.identity);
    assert_eq!(resolver.lister().calls().len(), 2);
}

#[tokio::test]
async fn projection_preserves_order_and_duplicates() {
    let mut dup = rec(3);
    dup.name = "dup".into();
    let nodes = vec![rec(9), rec(3), dup.clone(), rec(1), dup.clone()];
    let resolver = NodeQueryResolver::new(MockLister::nodes(nodes.clone()));
    let res = resolver.resolve(&QuerySpec::default()).await.expect("resolve");
    assert_eq!(res.nodes, nodes);

    let value = res.nodes_value();
    let arr = value.as_array().expect("array");
    assert_eq!(arr.len(), nodes.len());
    for (v, n) in arr.iter().zip(nodes.iter()) {
        assert_eq!(v["name"], n.name.as_str());
        assert_eq!(v["id"], n.id.as_str());
    }
}

/// Backend returning metadata alongside records.
struct IndexedLister;

#[async_trait::async_trait]
impl NodeLister for IndexedLister {
    async fn list_nodes(&self, _prefix: &str, _filter: &str) -> Result<NodeList, ListError> {
        let mut list = NodeList::new(vec![rec(1)]);
        list.meta.last_index = 42;
        list.meta.request_time = std::time::Duration::from_millis(12);
        Ok(list)
    }
}

#[tokio::test]
async fn meta_is_carried_through_and_boxed_backends_work() {
    let resolver = NodeQueryResolver::new(Box::new(IndexedLister) as Box<dyn NodeLister>);
    let res = resolver.resolve(&QuerySpec::default()).await.expect("resolve");
    assert_eq!(res.meta.last_index, 42);
    assert_eq!(res.meta.request_time, std::time::Duration::from_millis(12));
    assert_eq!(res.nodes.len(), 1);
}
