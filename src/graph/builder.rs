//! Dense adjacency matrix construction

use ndarray::Array2;

use crate::error::{PipelineError, Result};
use crate::graph::Graph;

/// Builder for incrementally constructing a symmetric adjacency matrix
pub struct AdjacencyBuilder {
    /// Number of nodes
    node_count: usize,

    /// Edges added so far, used to number edges in errors
    edges_added: usize,

    /// N x N matrix, zero-initialised
    matrix: Array2<f64>,
}

impl AdjacencyBuilder {
    /// Create a builder for a graph with `node_count` nodes
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            edges_added: 0,
            matrix: Array2::zeros((node_count, node_count)),
        }
    }

    /// Convert an edge endpoint to a row index, checking bounds
    fn index(&self, index: i64) -> Result<usize> {
        match usize::try_from(index) {
            Ok(idx) if idx < self.node_count => Ok(idx),
            _ => Err(PipelineError::IndexOutOfRange {
                edge: self.edges_added,
                index,
                node_count: self.node_count,
            }),
        }
    }

    /// Add an undirected edge between two node positions
    ///
    /// Repeated edges rewrite the same entries; a self-loop sets one
    /// diagonal entry.
    pub fn add_edge(&mut self, source: i64, target: i64) -> Result<()> {
        let src = self.index(source)?;
        let dst = self.index(target)?;

        self.matrix[[src, dst]] = 1.0;
        self.matrix[[dst, src]] = 1.0;
        self.edges_added += 1;

        Ok(())
    }

    /// Build the adjacency matrix
    pub fn build(self) -> Array2<f64> {
        self.matrix
    }
}

/// Build the dense adjacency matrix of a graph
pub fn build_adjacency(graph: &Graph) -> Result<Array2<f64>> {
    log::info!(
        "Building {}x{} adjacency matrix from {} edges",
        graph.node_count(),
        graph.node_count(),
        graph.edge_count()
    );

    let mut builder = AdjacencyBuilder::new(graph.node_count());
    for edge in &graph.edges {
        builder.add_edge(edge.source(), edge.target())?;
    }

    Ok(builder.build())
}
