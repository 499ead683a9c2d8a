//! Cluster analysis module

pub mod eigen;
pub mod kmeans;
pub mod metrics;
pub mod spectral;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use spectral::SpectralClustering;

/// Partitions the rows of a symmetric affinity matrix
///
/// Implementations return exactly one label per row, in row order. The input
/// is a precomputed affinity (larger means more similar), not a distance.
pub trait Clusterer {
    fn fit_predict(&self, affinity: &Array2<f64>) -> Result<Vec<usize>>;
}

impl<C: Clusterer + ?Sized> Clusterer for &C {
    fn fit_predict(&self, affinity: &Array2<f64>) -> Result<Vec<usize>> {
        (**self).fit_predict(affinity)
    }
}

/// Summary of one cluster in an assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Label shared by every member
    pub id: usize,

    /// Members of this cluster (node indices)
    pub members: Vec<usize>,

    /// Size of the cluster
    pub size: usize,

    /// Density: internal edges / potential undirected edges
    pub density: f64,

    /// Members with the highest internal degree
    pub central_nodes: Vec<usize>,
}
