//! Error types for the clustering pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input bytes are not well-formed JSON
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Required fields missing or of the wrong type
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Edge {edge} references node {index}, but the graph has {node_count} nodes")]
    IndexOutOfRange {
        edge: usize,
        index: i64,
        node_count: usize,
    },

    #[error("Cluster assignment has {labels} labels for {nodes} nodes")]
    LengthMismatch { nodes: usize, labels: usize },

    #[error("Serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Affinity matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Cannot form {n_clusters} clusters from {n_samples} nodes")]
    TooFewSamples { n_samples: usize, n_clusters: usize },

    #[error("Eigensolver did not converge after {iterations} iterations")]
    EigenNotConverged { iterations: usize },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
