//! JSON graph loading

use std::fs;
use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::graph::model::{EDGES_KEY, NODES_KEY, SOURCE_KEY, TARGET_KEY};
use crate::graph::{Edge, Graph, Node};

/// Load a graph document from a file
pub fn load_graph_file(path: impl AsRef<Path>) -> Result<Graph> {
    let path = path.as_ref();
    log::info!("Reading graph file: {}", path.display());

    let bytes = fs::read(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let graph = parse_graph(&bytes)?;
    log::info!(
        "Loaded graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(graph)
}

/// Load a graph document from any reader
pub fn load_graph<R: Read>(reader: R) -> Result<Graph> {
    let value: Value = serde_json::from_reader(reader).map_err(PipelineError::Parse)?;
    graph_from_value(value)
}

/// Parse a graph document from raw bytes
pub fn parse_graph(bytes: &[u8]) -> Result<Graph> {
    let value: Value = serde_json::from_slice(bytes).map_err(PipelineError::Parse)?;
    graph_from_value(value)
}

/// Validate the document shape and split out nodes and edges
pub fn graph_from_value(value: Value) -> Result<Graph> {
    let mut document = match value {
        Value::Object(map) => map,
        other => {
            return Err(PipelineError::Schema(format!(
                "expected a top-level object, found {}",
                type_name(&other)
            )))
        }
    };

    let nodes = take_array(&mut document, NODES_KEY)?
        .into_iter()
        .enumerate()
        .map(|(i, value)| parse_node(i, value))
        .collect::<Result<Vec<_>>>()?;

    let edges = take_array(&mut document, EDGES_KEY)?
        .into_iter()
        .enumerate()
        .map(|(i, value)| parse_edge(i, value))
        .collect::<Result<Vec<_>>>()?;

    Ok(Graph {
        nodes,
        edges,
        document,
    })
}

/// Remove a required array from the document, leaving a placeholder so the
/// key keeps its position
fn take_array(document: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>> {
    let slot = document
        .get_mut(key)
        .ok_or_else(|| PipelineError::Schema(format!("missing required field `{key}`")))?;

    match slot.take() {
        Value::Array(items) => Ok(items),
        other => Err(PipelineError::Schema(format!(
            "field `{key}` must be an array, found {}",
            type_name(&other)
        ))),
    }
}

fn parse_node(index: usize, value: Value) -> Result<Node> {
    match value {
        Value::Object(fields) => Ok(Node::new(fields)),
        other => Err(PipelineError::Schema(format!(
            "node {index} must be an object, found {}",
            type_name(&other)
        ))),
    }
}

fn parse_edge(index: usize, value: Value) -> Result<Edge> {
    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(PipelineError::Schema(format!(
                "edge {index} must be an object, found {}",
                type_name(&other)
            )))
        }
    };

    let endpoint = |key: &str| -> Result<i64> {
        let value = fields
            .get(key)
            .ok_or_else(|| PipelineError::Schema(format!("edge {index} is missing `{key}`")))?;
        value.as_i64().ok_or_else(|| {
            PipelineError::Schema(format!(
                "edge {index} field `{key}` must be an integer, found {value}"
            ))
        })
    };

    let source = endpoint(SOURCE_KEY)?;
    let target = endpoint(TARGET_KEY)?;

    Ok(Edge::from_parts(source, target, fields))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
