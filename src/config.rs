//! Configuration management for the clustering pipeline

use std::path::PathBuf;

use crate::error::{PipelineError, Result};

/// Input file read when no path is given
pub const DEFAULT_INPUT: &str = "facebook_1912.json";

/// Output file written when no path is given
pub const DEFAULT_OUTPUT: &str = "facebook_1912_clusters.json";

/// Strategy used to extract the leading eigenvectors of the affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EigenSolver {
    /// Dense for small graphs, subspace iteration otherwise
    Auto,
    /// Full cyclic Jacobi decomposition
    Dense,
    /// Block orthogonal iteration with Rayleigh-Ritz refinement
    Subspace,
}

/// Settings for the spectral clustering oracle
#[derive(Debug, Clone)]
pub struct SpectralConfig {
    /// Number of clusters (and embedding dimensions)
    pub n_clusters: usize,

    /// Number of k-means restarts; the lowest inertia wins
    pub n_init: usize,

    /// Maximum Lloyd iterations per k-means restart
    pub max_iter: usize,

    /// Relative k-means tolerance, scaled by the mean feature variance
    pub tol: f64,

    /// Eigen solver selection
    pub eigen_solver: EigenSolver,

    /// Residual tolerance for the eigen solvers
    pub eigen_tol: f64,

    /// Iteration cap for the eigen solvers
    pub eigen_max_iter: usize,

    /// Seed for all random initialisation; entropy when absent
    pub seed: Option<u64>,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            n_clusters: 8,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            eigen_solver: EigenSolver::Auto,
            eigen_tol: 1e-8,
            eigen_max_iter: 5_000,
            seed: None,
        }
    }
}

impl SpectralConfig {
    /// Create a configuration with the given cluster count and defaults elsewhere
    pub fn with_clusters(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(PipelineError::InvalidConfig(
                "cluster count must be at least 1".to_string(),
            ));
        }
        if self.n_init == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_init must be at least 1".to_string(),
            ));
        }
        if self.max_iter == 0 || self.eigen_max_iter == 0 {
            return Err(PipelineError::InvalidConfig(
                "iteration limits must be at least 1".to_string(),
            ));
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(PipelineError::InvalidConfig(
                "k-means tolerance must be finite and non-negative".to_string(),
            ));
        }
        if !self.eigen_tol.is_finite() || self.eigen_tol <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "eigen tolerance must be finite and positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct Config {
    /// Graph JSON to read
    pub input: PathBuf,

    /// Annotated graph JSON to write
    pub output: PathBuf,

    /// Optional cluster summary JSON
    pub summary: Option<PathBuf>,

    /// Clustering oracle settings
    pub spectral: SpectralConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            summary: None,
            spectral: SpectralConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with custom paths
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    /// Output may name the input file; it is replaced only after a full run
    pub fn validate(&self) -> Result<()> {
        self.spectral.validate()
    }
}
