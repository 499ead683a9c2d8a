//! Spectral clustering over a precomputed affinity matrix

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cluster::eigen::{jacobi_eigen, subspace_eigen, EigenPairs};
use crate::cluster::kmeans::KMeans;
use crate::cluster::Clusterer;
use crate::config::{EigenSolver, SpectralConfig};
use crate::error::{PipelineError, Result};
use crate::graph::algorithms;

/// Graphs up to this many nodes use the dense solver under `EigenSolver::Auto`
pub const DENSE_SOLVER_LIMIT: usize = 200;

/// Spectral clustering with a precomputed affinity and k-means label assignment
#[derive(Debug, Clone)]
pub struct SpectralClustering {
    config: SpectralConfig,
}

/// Normalized affinity `I - L_sym` together with the square-root degrees
#[derive(Debug, Clone)]
pub struct NormalizedAffinity {
    pub matrix: Array2<f64>,
    /// `sqrt(degree)`, or 1 for isolated nodes
    pub sqrt_degrees: Array1<f64>,
}

impl SpectralClustering {
    pub fn new(config: SpectralConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Spectral embedding: one row per node, one column per cluster
    pub fn embed(&self, affinity: &Array2<f64>, rng: &mut StdRng) -> Result<Array2<f64>> {
        let n = affinity.nrows();
        let k = self.config.n_clusters.min(n);

        if !algorithms::is_fully_connected(affinity) {
            log::warn!(
                "Graph is not fully connected ({} components), spectral embedding may not work as expected",
                algorithms::component_count(affinity)
            );
        }

        let normalized = normalize_affinity(affinity);
        let pairs = self.leading_eigenpairs(&normalized.matrix, k, rng)?;
        log::debug!("Leading eigenvalues: {:?}", pairs.values.to_vec());

        let mut embedding = pairs.vectors;
        for (mut row, &dd) in embedding.axis_iter_mut(Axis(0)).zip(normalized.sqrt_degrees.iter()) {
            row.mapv_inplace(|x| x / dd);
        }
        deterministic_sign_flip(&mut embedding);

        Ok(embedding)
    }

    fn leading_eigenpairs(
        &self,
        matrix: &Array2<f64>,
        k: usize,
        rng: &mut StdRng,
    ) -> Result<EigenPairs> {
        let n = matrix.nrows();
        let block = (2 * k).max(k + 8);
        let solver = match self.config.eigen_solver {
            EigenSolver::Auto if n <= DENSE_SOLVER_LIMIT || block >= n => EigenSolver::Dense,
            EigenSolver::Auto => EigenSolver::Subspace,
            other => other,
        };

        log::info!("Computing {} leading eigenvectors with {:?} solver", k, solver);

        match solver {
            EigenSolver::Subspace => {
                // Spectrum of D^-1/2 A D^-1/2 lies in [-1, 1]
                let result = subspace_eigen(
                    matrix,
                    k,
                    -1.0,
                    self.config.eigen_tol,
                    self.config.eigen_max_iter,
                    rng,
                );
                match result {
                    Err(PipelineError::EigenNotConverged { iterations })
                        if self.config.eigen_solver == EigenSolver::Auto =>
                    {
                        log::warn!(
                            "Subspace solver did not converge after {} iterations, falling back to dense solver",
                            iterations
                        );
                        self.dense_eigenpairs(matrix, k)
                    }
                    other => other,
                }
            }
            _ => self.dense_eigenpairs(matrix, k),
        }
    }

    fn dense_eigenpairs(&self, matrix: &Array2<f64>, k: usize) -> Result<EigenPairs> {
        Ok(jacobi_eigen(matrix, self.config.eigen_tol * 1e-4)?.truncate(k))
    }
}

impl Clusterer for SpectralClustering {
    fn fit_predict(&self, affinity: &Array2<f64>) -> Result<Vec<usize>> {
        let (rows, cols) = affinity.dim();
        if rows != cols {
            return Err(PipelineError::NotSquare { rows, cols });
        }
        self.config.validate()?;

        if rows == 0 {
            log::info!("Empty affinity matrix, nothing to cluster");
            return Ok(Vec::new());
        }
        if rows < self.config.n_clusters {
            return Err(PipelineError::TooFewSamples {
                n_samples: rows,
                n_clusters: self.config.n_clusters,
            });
        }

        log::info!(
            "Running spectral clustering on {} nodes with {} clusters",
            rows,
            self.config.n_clusters
        );

        let mut rng = self.rng();
        let embedding = self.embed(affinity, &mut rng)?;

        let kmeans = KMeans::new(
            self.config.n_clusters,
            self.config.n_init,
            self.config.max_iter,
            self.config.tol,
        );
        let fit = kmeans.fit(embedding.view(), &mut rng)?;
        log::info!("k-means finished with inertia {:.6}", fit.inertia);

        Ok(fit.labels)
    }
}

/// Build `D^-1/2 A D^-1/2` with the diagonal of `A` ignored
///
/// Isolated nodes get a degree of 1 and a unit diagonal entry, so each one
/// forms its own eigenvalue-1 component like any other connected component.
pub fn normalize_affinity(affinity: &Array2<f64>) -> NormalizedAffinity {
    let n = affinity.nrows();
    let degrees = algorithms::degrees(affinity);
    let sqrt_degrees = degrees.mapv(|d| if d > 0.0 { d.sqrt() } else { 1.0 });

    let mut matrix = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            if i != j {
                matrix[[i, j]] = affinity[[i, j]] / (sqrt_degrees[i] * sqrt_degrees[j]);
            }
        }
        if degrees[i] <= 0.0 {
            matrix[[i, i]] = 1.0;
        }
    }

    NormalizedAffinity {
        matrix,
        sqrt_degrees,
    }
}

/// Flip each column so its largest-magnitude entry is positive
pub fn deterministic_sign_flip(vectors: &mut Array2<f64>) {
    for mut column in vectors.axis_iter_mut(Axis(1)) {
        let pivot = column
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap_or(0.0);
        if pivot < 0.0 {
            column.mapv_inplace(|x| -x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// Disjoint cliques of the given sizes, optionally joined by bridges
    fn cliques(sizes: &[usize], bridges: &[(usize, usize)]) -> Array2<f64> {
        let n: usize = sizes.iter().sum();
        let mut m = Array2::zeros((n, n));
        let mut start = 0;
        for &size in sizes {
            for i in start..start + size {
                for j in start..start + size {
                    if i != j {
                        m[[i, j]] = 1.0;
                    }
                }
            }
            start += size;
        }
        for &(a, b) in bridges {
            m[[a, b]] = 1.0;
            m[[b, a]] = 1.0;
        }
        m
    }

    fn seeded(n_clusters: usize, solver: EigenSolver) -> SpectralClustering {
        SpectralClustering::new(SpectralConfig {
            n_clusters,
            eigen_solver: solver,
            seed: Some(17),
            ..SpectralConfig::default()
        })
    }

    fn assert_groups(labels: &[usize], sizes: &[usize]) {
        let mut start = 0;
        let mut seen = Vec::new();
        for &size in sizes {
            let label = labels[start];
            assert!(labels[start..start + size].iter().all(|&l| l == label));
            assert!(!seen.contains(&label));
            seen.push(label);
            start += size;
        }
    }

    #[test]
    fn test_normalize_affinity() {
        let a = array![[0.0, 1.0, 0.0], [1.0, 0.0, 1.0], [0.0, 1.0, 0.0]];
        let norm = normalize_affinity(&a);
        let expected = 1.0 / 2f64.sqrt();

        assert_abs_diff_eq!(norm.matrix[[0, 1]], expected, epsilon = 1e-12);
        assert_abs_diff_eq!(norm.matrix[[1, 2]], expected, epsilon = 1e-12);
        assert_eq!(norm.matrix[[0, 0]], 0.0);
        assert_eq!(norm.matrix[[0, 2]], 0.0);
    }

    #[test]
    fn test_normalize_ignores_self_loops_and_isolated_nodes() {
        let a = array![[1.0, 0.0], [0.0, 0.0]];
        let norm = normalize_affinity(&a);
        assert_eq!(norm.matrix, array![[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(norm.sqrt_degrees, array![1.0, 1.0]);
    }

    #[test]
    fn test_sign_flip() {
        let mut v = array![[0.1, -0.9], [-0.5, 0.2]];
        deterministic_sign_flip(&mut v);
        assert_eq!(v, array![[-0.1, 0.9], [0.5, -0.2]]);
    }

    #[test]
    fn test_two_disconnected_triangles() {
        let affinity = cliques(&[3, 3], &[]);
        let labels = seeded(2, EigenSolver::Auto).fit_predict(&affinity).unwrap();
        assert_eq!(labels.len(), 6);
        assert_groups(&labels, &[3, 3]);
    }

    #[test]
    fn test_bridged_cliques_dense() {
        let sizes = [6, 5, 7];
        let affinity = cliques(&sizes, &[(0, 6), (7, 12)]);
        let labels = seeded(3, EigenSolver::Dense).fit_predict(&affinity).unwrap();
        assert_groups(&labels, &sizes);
    }

    #[test]
    fn test_bridged_cliques_subspace() {
        let sizes = [40, 40];
        let affinity = cliques(&sizes, &[(0, 40)]);
        let labels = seeded(2, EigenSolver::Subspace).fit_predict(&affinity).unwrap();
        assert_groups(&labels, &sizes);
    }

    #[test]
    fn test_solvers_produce_same_partition() {
        let sizes = [12, 10, 9];
        let affinity = cliques(&sizes, &[(0, 12), (13, 22)]);
        let dense = seeded(3, EigenSolver::Dense).fit_predict(&affinity).unwrap();
        let subspace = seeded(3, EigenSolver::Subspace).fit_predict(&affinity).unwrap();
        assert_groups(&dense, &sizes);
        assert_groups(&subspace, &sizes);
    }

    #[test]
    fn test_seeded_runs_are_deterministic() {
        let affinity = cliques(&[4, 4, 4], &[(0, 4), (5, 8)]);
        let clusterer = seeded(3, EigenSolver::Auto);
        assert_eq!(
            clusterer.fit_predict(&affinity).unwrap(),
            clusterer.fit_predict(&affinity).unwrap()
        );
    }

    #[test]
    fn test_empty_affinity() {
        let affinity: Array2<f64> = Array2::zeros((0, 0));
        let labels = seeded(8, EigenSolver::Auto).fit_predict(&affinity).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_too_few_nodes() {
        let affinity = cliques(&[3], &[]);
        let err = seeded(8, EigenSolver::Auto).fit_predict(&affinity).unwrap_err();
        assert!(matches!(err, PipelineError::TooFewSamples { n_samples: 3, n_clusters: 8 }));
    }

    #[test]
    fn test_rejects_non_square() {
        let affinity = Array2::zeros((2, 3));
        let err = seeded(1, EigenSolver::Auto).fit_predict(&affinity).unwrap_err();
        assert!(matches!(err, PipelineError::NotSquare { rows: 2, cols: 3 }));
    }

    /// Unweighted path 0 - 1 - ... - (n - 1)
    fn path(n: usize) -> Array2<f64> {
        let mut m = Array2::zeros((n, n));
        for i in 0..n - 1 {
            m[[i, i + 1]] = 1.0;
            m[[i + 1, i]] = 1.0;
        }
        m
    }

    #[test]
    fn test_auto_solver_handles_long_path() {
        // Closely spaced leading eigenvalues, above the dense limit
        let affinity = path(500);
        let labels = seeded(8, EigenSolver::Auto).fit_predict(&affinity).unwrap();

        assert_eq!(labels.len(), 500);
        let mut distinct = labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_auto_falls_back_to_dense_when_subspace_stalls() {
        let affinity = path(300);
        let clusterer = SpectralClustering::new(SpectralConfig {
            n_clusters: 4,
            eigen_max_iter: 1,
            seed: Some(3),
            ..SpectralConfig::default()
        });
        let labels = clusterer.fit_predict(&affinity).unwrap();
        assert_eq!(labels.len(), 300);

        let explicit = SpectralClustering::new(SpectralConfig {
            eigen_solver: EigenSolver::Subspace,
            ..clusterer.config().clone()
        });
        let err = explicit.fit_predict(&affinity).unwrap_err();
        assert!(matches!(err, PipelineError::EigenNotConverged { iterations: 1 }));
    }

    #[test]
    fn test_isolated_nodes_form_own_cluster() {
        // Triangle plus two isolated nodes, three clusters
        let mut affinity = Array2::zeros((5, 5));
        for &(a, b) in &[(0, 1), (1, 2), (0, 2)] {
            affinity[[a, b]] = 1.0;
            affinity[[b, a]] = 1.0;
        }
        let labels = seeded(3, EigenSolver::Dense).fit_predict(&affinity).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_ne!(labels[3], labels[0]);
        assert_ne!(labels[4], labels[0]);
        assert_ne!(labels[3], labels[4]);
    }
}
