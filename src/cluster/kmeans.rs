//! K-means label assignment over the spectral embedding

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};

/// Result of a single k-means run
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centers: Array2<f64>,
    /// Sum of squared distances to the assigned centers
    pub inertia: f64,
    pub iterations: usize,
}

/// Lloyd's k-means with greedy k-means++ seeding and multiple restarts
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    n_init: usize,
    max_iter: usize,
    tol: f64,
}

impl KMeans {
    pub fn new(n_clusters: usize, n_init: usize, max_iter: usize, tol: f64) -> Self {
        Self {
            n_clusters,
            n_init,
            max_iter,
            tol,
        }
    }

    /// Run `n_init` seeded restarts in parallel and keep the lowest inertia
    ///
    /// Each restart gets its own seed drawn from `rng` before any work starts,
    /// so the outcome does not depend on the thread count.
    pub fn fit<R: Rng>(&self, data: ArrayView2<f64>, rng: &mut R) -> Result<KMeansFit> {
        let n_samples = data.nrows();
        if n_samples < self.n_clusters {
            return Err(PipelineError::TooFewSamples {
                n_samples,
                n_clusters: self.n_clusters,
            });
        }
        if self.n_clusters == 0 || self.n_init == 0 {
            return Err(PipelineError::InvalidConfig(
                "k-means needs at least one cluster and one restart".to_string(),
            ));
        }

        let tol = scaled_tolerance(data, self.tol);
        let seeds: Vec<u64> = (0..self.n_init).map(|_| rng.gen()).collect();

        let fits: Vec<KMeansFit> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut run_rng = StdRng::seed_from_u64(seed);
                let centers = kmeans_plus_plus(data, self.n_clusters, &mut run_rng);
                lloyd(data, centers, self.max_iter, tol)
            })
            .collect();

        // Ties keep the earliest restart
        let mut best: Option<KMeansFit> = None;
        for fit in fits {
            log::debug!(
                "k-means restart finished in {} iterations, inertia {:.6}",
                fit.iterations,
                fit.inertia
            );
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| PipelineError::InvalidConfig("k-means produced no runs".to_string()))
    }
}

/// Convergence tolerance scaled by the mean per-feature variance
fn scaled_tolerance(data: ArrayView2<f64>, tol: f64) -> f64 {
    if data.ncols() == 0 || data.nrows() == 0 {
        return 0.0;
    }
    let variances = data.var_axis(Axis(0), 0.0);
    variances.mean().unwrap_or(0.0) * tol
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Greedy k-means++ seeding with `2 + ln(k)` candidates per center
pub fn kmeans_plus_plus<R: Rng>(data: ArrayView2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let (n, dim) = data.dim();
    let mut centers = Array2::zeros((k, dim));
    if n == 0 || k == 0 {
        return centers;
    }

    let n_local_trials = 2 + (k as f64).ln().floor() as usize;

    let first = rng.gen_range(0..n);
    centers.row_mut(0).assign(&data.row(first));

    let mut closest: Array1<f64> = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, data.row(first)))
        .collect();

    for c in 1..k {
        let potential: f64 = closest.sum();

        let mut best_candidate = 0;
        let mut best_potential = f64::INFINITY;
        let mut best_distances = closest.clone();

        for _ in 0..n_local_trials {
            let candidate = if potential > 0.0 {
                sample_index(&closest, rng.gen::<f64>() * potential)
            } else {
                // Every point coincides with a chosen center
                rng.gen_range(0..n)
            };

            let distances: Array1<f64> = data
                .rows()
                .into_iter()
                .zip(closest.iter())
                .map(|(row, &current)| current.min(squared_distance(row, data.row(candidate))))
                .collect();
            let candidate_potential = distances.sum();

            if candidate_potential < best_potential {
                best_candidate = candidate;
                best_potential = candidate_potential;
                best_distances = distances;
            }
        }

        centers.row_mut(c).assign(&data.row(best_candidate));
        closest = best_distances;
    }

    centers
}

/// Index whose cumulative weight first exceeds `target`
fn sample_index(weights: &Array1<f64>, target: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > target {
            return i;
        }
    }
    weights.len() - 1
}

/// Assign every point to its nearest center
fn assign(data: ArrayView2<f64>, centers: &Array2<f64>, labels: &mut [usize], distances: &mut [f64]) {
    for (i, row) in data.rows().into_iter().enumerate() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, center) in centers.rows().into_iter().enumerate() {
            let d = squared_distance(row, center);
            if d < best_dist {
                best = c;
                best_dist = d;
            }
        }
        labels[i] = best;
        distances[i] = best_dist;
    }
}

/// Lloyd iterations from the given starting centers
pub fn lloyd(data: ArrayView2<f64>, mut centers: Array2<f64>, max_iter: usize, tol: f64) -> KMeansFit {
    let (n, dim) = data.dim();
    let k = centers.nrows();
    let mut labels = vec![0usize; n];
    let mut distances = vec![0.0; n];
    let mut iterations = 0;

    for iteration in 1..=max_iter {
        iterations = iteration;
        let previous_labels = labels.clone();
        assign(data, &centers, &mut labels, &mut distances);

        // Recompute centers as member means
        let mut sums = Array2::<f64>::zeros((k, dim));
        let mut counts = vec![0usize; k];
        for (i, row) in data.rows().into_iter().enumerate() {
            sums.row_mut(labels[i]).scaled_add(1.0, &row);
            counts[labels[i]] += 1;
        }

        // Relocate empty clusters onto the points farthest from their centers
        let mut taken = vec![false; n];
        for c in 0..k {
            if counts[c] > 0 {
                continue;
            }
            let far = (0..n)
                .filter(|&i| !taken[i] && counts[labels[i]] > 1)
                .max_by(|&a, &b| distances[a].total_cmp(&distances[b]));
            if let Some(i) = far {
                taken[i] = true;
                let old = labels[i];
                sums.row_mut(old).scaled_add(-1.0, &data.row(i));
                counts[old] -= 1;
                sums.row_mut(c).assign(&data.row(i));
                counts[c] = 1;
                labels[i] = c;
                distances[i] = 0.0;
            }
        }

        let mut new_centers = centers.clone();
        for c in 0..k {
            if counts[c] > 0 {
                let mean = &sums.row(c) / counts[c] as f64;
                new_centers.row_mut(c).assign(&mean);
            }
        }

        let shift: f64 = (&new_centers - &centers).iter().map(|x| x * x).sum();
        centers = new_centers;

        if iteration > 1 && labels == previous_labels {
            break;
        }
        if shift <= tol {
            break;
        }
    }

    // Final assignment against the converged centers
    assign(data, &centers, &mut labels, &mut distances);
    let inertia = distances.iter().sum();

    KMeansFit {
        labels,
        centers,
        inertia,
        iterations,
    }
}
