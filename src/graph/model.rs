//! Schema-free graph document model
//!
//! Nodes and edges keep every field of the input document, in input order,
//! so that the annotated graph can be written back with nothing but the
//! `cluster` key added.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

/// Key added to every node once it has been assigned a cluster
pub const CLUSTER_KEY: &str = "cluster";

pub(crate) const NODES_KEY: &str = "nodes";
pub(crate) const EDGES_KEY: &str = "edges";
pub(crate) const SOURCE_KEY: &str = "source";
pub(crate) const TARGET_KEY: &str = "target";

/// A node record, identified by its position in the node sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Node {
    pub fields: Map<String, Value>,
}

impl Node {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Cluster label, if the node has been annotated
    pub fn cluster(&self) -> Option<u64> {
        self.fields.get(CLUSTER_KEY).and_then(Value::as_u64)
    }

    /// Set the cluster label, replacing any previous value in place
    pub fn set_cluster(&mut self, label: usize) {
        self.fields
            .insert(CLUSTER_KEY.to_string(), Value::from(label as u64));
    }
}

/// An undirected edge between two node positions
///
/// `source` and `target` are validated as integers on load but may still be
/// out of range; the matrix builder checks bounds. The endpoints are parsed
/// from `fields` and never change independently of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    source: i64,
    target: i64,

    /// Every field of the edge object, including `source` and `target`
    fields: Map<String, Value>,
}

impl Edge {
    /// Create an edge with no extra fields
    pub fn new(source: i64, target: i64) -> Self {
        let mut fields = Map::new();
        fields.insert(SOURCE_KEY.to_string(), Value::from(source));
        fields.insert(TARGET_KEY.to_string(), Value::from(target));
        Self {
            source,
            target,
            fields,
        }
    }

    /// Wrap an edge object whose endpoints were already read from `fields`
    pub(crate) fn from_parts(source: i64, target: i64, fields: Map<String, Value>) -> Self {
        Self {
            source,
            target,
            fields,
        }
    }

    pub fn source(&self) -> i64 {
        self.source
    }

    pub fn target(&self) -> i64 {
        self.target
    }

    /// Every field of the edge object, in input order
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

impl Serialize for Edge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// A graph document: ordered nodes, edges, and any other top-level keys
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,

    /// Top-level document in input key order. The `nodes` and `edges`
    /// entries are placeholders; the typed vectors above are written there.
    pub(crate) document: Map<String, Value>,
}

impl Graph {
    /// Create a graph whose document holds only `nodes` and `edges`
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut document = Map::new();
        document.insert(NODES_KEY.to_string(), Value::Null);
        document.insert(EDGES_KEY.to_string(), Value::Null);
        Self {
            nodes,
            edges,
            document,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Top-level value other than `nodes` and `edges`
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        match key {
            NODES_KEY | EDGES_KEY => None,
            _ => self.document.get(key),
        }
    }
}

impl Serialize for Graph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.document.len()))?;
        for (key, value) in &self.document {
            match key.as_str() {
                NODES_KEY => map.serialize_entry(key, &self.nodes)?,
                EDGES_KEY => map.serialize_entry(key, &self.edges)?,
                _ => map.serialize_entry(key, value)?,
            }
        }
        map.end()
    }
}
