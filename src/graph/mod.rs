//! Graph representation and algorithms module

pub mod model;
pub mod builder;
pub mod algorithms;

pub use builder::{build_adjacency, AdjacencyBuilder};
pub use model::{Edge, Graph, Node, CLUSTER_KEY};
