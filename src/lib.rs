//! Core library functions for spectral clustering of JSON graphs

pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod cluster;
pub mod pipeline;
pub mod storage;

pub use cluster::{Clusterer, SpectralClustering};
pub use config::{Config, EigenSolver, SpectralConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{cluster_graph, Pipeline, RunReport};
