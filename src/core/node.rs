//! Purpose: Define the decoded parameter tree (`Node`) and its JSON rendering.
//! Exports: `Node`, `NodeKind`, `Object`.
//! Role: Output model of the assembler; consumed by CLI/server renderers and validators.
//! Invariants: Only three shapes exist (scalar string, list, object); no coercion.
//! Invariants: Object keys keep first-seen order so rendered output is deterministic.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

pub type Object = IndexMap<String, Node>;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Scalar(String),
    List(Vec<Node>),
    Object(Object),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Scalar,
    List,
    Object,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeKind::Scalar => "scalar",
            NodeKind::List => "list",
            NodeKind::Object => "object",
        };
        f.write_str(label)
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Scalar(_) => NodeKind::Scalar,
            Node::List(_) => NodeKind::List,
            Node::Object(_) => NodeKind::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Node::Scalar(value) => Value::String(value.clone()),
            Node::List(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Object(map) => object_to_json(map),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Scalar(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Scalar(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::List(items)
    }
}

impl From<Object> for Node {
    fn from(map: Object) -> Self {
        Node::Object(map)
    }
}

pub fn object_to_json(map: &Object) -> Value {
    let mut out = serde_json::Map::new();
    for (key, node) in map {
        out.insert(key.clone(), node.to_json());
    }
    Value::Object(out)
}
