//! nodelist schema: the `nodes` data source schema and an in-memory host
//! record (`ResourceData`) that validates writes against it.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use nodelist_core::{ConfigSource, OutputSink, SinkError, NODES_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    String,
    List,
}

impl AttrType {
    fn as_str(self) -> &'static str {
        match self {
            AttrType::String => "string",
            AttrType::List => "list",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub ty: AttrType,
    pub optional: bool,
    pub computed: bool,
    pub description: String,
    /// Element attributes for lists of objects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elem: Vec<Attribute>,
}

impl Attribute {
    fn new(name: &str, ty: AttrType, description: &str) -> Self {
        Self { name: name.to_string(), ty, optional: false, computed: false, description: description.to_string(), elem: Vec::new() }
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    fn with_elem(mut self, elem: Vec<Attribute>) -> Self {
        self.elem = elem;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub attributes: Vec<Attribute>,
}

/// Schema of the `nodes` data source.
pub fn nodes_schema() -> Schema {
    let node = vec![
        Attribute::new("address", AttrType::String, "Address for this node.").computed(),
        Attribute::new("id", AttrType::String, "ID for this node.").computed(),
        Attribute::new("datacenter", AttrType::String, "Datacenter for this node.").computed(),
        Attribute::new("name", AttrType::String, "Unique name for this node.").computed(),
        Attribute::new("node_class", AttrType::String, "Node class for this node.").computed(),
        Attribute::new("node_pool", AttrType::String, "Node pool for this node.").computed(),
    ];
    Schema {
        attributes: vec![
            Attribute::new("prefix", AttrType::String, "Specifies a string to filter nodes based on a name prefix.").optional(),
            Attribute::new("filter", AttrType::String, "Specifies the expression used to filter the results.").optional(),
            Attribute::new(NODES_FIELD, AttrType::List, "List of nodes returned").computed().with_elem(node),
        ],
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn mismatch(field: &str, expected: &str, got: &str) -> SinkError {
    SinkError::TypeMismatch { field: field.to_string(), expected: expected.to_string(), got: got.to_string() }
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check that `value` may be written to the computed field `field`.
    pub fn validate_set(&self, field: &str, value: &Value) -> Result<(), SinkError> {
        let attr = self.attribute(field).ok_or_else(|| SinkError::UnknownField(field.to_string()))?;
        if !attr.computed {
            return Err(SinkError::NotComputed(field.to_string()));
        }
        check_value(field, attr, value)
    }
}

fn check_value(path: &str, attr: &Attribute, value: &Value) -> Result<(), SinkError> {
    match (attr.ty, value) {
        (AttrType::String, Value::String(_)) => Ok(()),
        (AttrType::List, Value::Array(items)) => {
            if attr.elem.is_empty() {
                return Ok(());
            }
            for (i, item) in items.iter().enumerate() {
                let obj = item
                    .as_object()
                    .ok_or_else(|| mismatch(&format!("{}.{}", path, i), "object", value_kind(item)))?;
                for key in obj.keys() {
                    if !attr.elem.iter().any(|e| &e.name == key) {
                        return Err(SinkError::UnknownField(format!("{}.{}.{}", path, i, key)));
                    }
                }
                for e in &attr.elem {
                    let p = format!("{}.{}.{}", path, i, e.name);
                    match obj.get(&e.name) {
                        Some(v) => check_value(&p, e, v)?,
                        None => return Err(mismatch(&p, e.ty.as_str(), "missing")),
                    }
                }
            }
            Ok(())
        }
        (ty, v) => Err(mismatch(path, ty.as_str(), value_kind(v))),
    }
}

/// In-memory host record for one data source read.
#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: Schema,
    config: BTreeMap<String, String>,
    id: String,
    state: BTreeMap<String, Value>,
}

impl ResourceData {
    pub fn new(schema: Schema) -> Self {
        Self { schema, config: BTreeMap::new(), id: String::new(), state: BTreeMap::new() }
    }

    /// Add a configured (non-computed-only) string argument.
    pub fn with_config(mut self, field: &str, value: impl Into<String>) -> Result<Self> {
        let attr = self.schema.attribute(field).ok_or_else(|| anyhow!("unknown config field: {}", field))?;
        if attr.computed && !attr.optional {
            return Err(anyhow!("field {} is computed and cannot be configured", field));
        }
        if attr.ty != AttrType::String {
            return Err(anyhow!("field {} is a {}, expected string", field, attr.ty.as_str()));
        }
        self.config.insert(field.to_string(), value.into());
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_absent(&self) -> bool {
        self.id.is_empty()
    }

    pub fn get_state(&self, field: &str) -> Option<&Value> {
        self.state.get(field)
    }

    /// Render `{ "id": .., <config>, <computed> }`.
    pub fn to_state(&self) -> Value {
        let mut m = serde_json::Map::new();
        m.insert("id".into(), Value::String(self.id.clone()));
        for (k, v) in &self.config {
            m.insert(k.clone(), Value::String(v.clone()));
        }
        for (k, v) in &self.state {
            m.insert(k.clone(), v.clone());
        }
        Value::Object(m)
    }
}

impl ConfigSource for ResourceData {
    fn get(&self, field: &str) -> Option<String> {
        self.config.get(field).cloned()
    }
}

impl OutputSink for ResourceData {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), SinkError> {
        self.schema.validate_set(field, &value)?;
        debug!(field, "resource data: set");
        self.state.insert(field.to_string(), value);
        Ok(())
    }
}
