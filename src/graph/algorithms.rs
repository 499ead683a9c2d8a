//! Graph algorithms over dense adjacency matrices

use ndarray::{Array1, Array2, Axis};
use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;

/// Convert the nonzero entries of a symmetric matrix into a petgraph graph
///
/// Only the upper triangle is read; the diagonal is ignored.
pub fn to_petgraph(matrix: &Array2<f64>) -> UnGraph<(), ()> {
    let n = matrix.nrows();
    let mut graph = UnGraph::with_capacity(n, 0);
    let indices: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();

    for i in 0..n {
        for j in (i + 1)..n {
            if matrix[[i, j]] != 0.0 {
                graph.add_edge(indices[i], indices[j], ());
            }
        }
    }

    graph
}

/// Number of connected components, treating isolated nodes as components
pub fn component_count(matrix: &Array2<f64>) -> usize {
    connected_components(&to_petgraph(matrix))
}

/// Whether every node can reach every other node
pub fn is_fully_connected(matrix: &Array2<f64>) -> bool {
    component_count(matrix) <= 1
}

/// Weighted degree of each node, excluding the diagonal
pub fn degrees(matrix: &Array2<f64>) -> Array1<f64> {
    let mut degrees = matrix.sum_axis(Axis(1));
    for (i, degree) in degrees.iter_mut().enumerate() {
        *degree -= matrix[[i, i]];
    }
    degrees
}

/// Number of distinct undirected edges, self-loops included
pub fn undirected_edge_count(matrix: &Array2<f64>) -> usize {
    let n = matrix.nrows();
    let mut count = 0;
    for i in 0..n {
        for j in i..n {
            if matrix[[i, j]] != 0.0 {
                count += 1;
            }
        }
    }
    count
}
