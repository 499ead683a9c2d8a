//! Symmetric eigensolvers for the spectral embedding
//!
//! Two solvers are provided. `jacobi_eigen` decomposes a full symmetric
//! matrix with cyclic Jacobi rotations and is used directly on small graphs
//! and for the projected problem of the subspace solver. `subspace_eigen`
//! runs Chebyshev-filtered block iteration with Rayleigh-Ritz refinement
//! over sparse rows, which keeps large graphs tractable.
//!
//! Both return eigenpairs sorted by eigenvalue, largest first.

use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::Rng;

use crate::error::{PipelineError, Result};

/// Maximum number of full Jacobi sweeps
const MAX_SWEEPS: usize = 100;

/// Eigenvalues (descending) and matching eigenvectors as columns
#[derive(Debug, Clone)]
pub struct EigenPairs {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
}

impl EigenPairs {
    /// Keep only the leading `k` pairs
    pub fn truncate(self, k: usize) -> Self {
        let k = k.min(self.values.len());
        Self {
            values: self.values.slice(s![..k]).to_owned(),
            vectors: self.vectors.slice(s![.., ..k]).to_owned(),
        }
    }
}

/// Full eigendecomposition of a symmetric matrix by cyclic Jacobi rotations
pub fn jacobi_eigen(matrix: &Array2<f64>, tol: f64) -> Result<EigenPairs> {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(1.0);
    let mut converged = n <= 1;

    for _ in 0..MAX_SWEEPS {
        if off_diagonal_norm(&a) <= tol * scale {
            converged = true;
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                // Rotation angle that zeroes a[p, q]
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let sn = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - sn * akq;
                    a[[k, q]] = sn * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - sn * aqk;
                    a[[q, k]] = sn * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - sn * vkq;
                    v[[k, q]] = sn * vkp + c * vkq;
                }
            }
        }
    }

    if !converged && off_diagonal_norm(&a) > tol * scale {
        return Err(PipelineError::EigenNotConverged {
            iterations: MAX_SWEEPS,
        });
    }

    Ok(sorted_pairs(a.diag().to_owned(), v))
}

/// Highest Chebyshev filter degree applied between Rayleigh-Ritz steps
const MAX_FILTER_DEGREE: usize = 16;

/// Cap on the filter's amplification of the top of the spectrum; keeps the
/// smaller wanted directions above rounding noise
const MAX_FILTER_GROWTH: f64 = 1e8;

/// Symmetric matrix stored as offset-indexed rows of nonzero entries
///
/// Affinities are mostly zeros, so products against the iteration block
/// cost O(nnz * block) instead of O(n^2 * block).
#[derive(Debug, Clone)]
pub struct SparseRows {
    n_rows: usize,

    /// `offsets[i]..offsets[i + 1]` is the entry range of row i
    offsets: Vec<usize>,

    columns: Vec<usize>,
    values: Vec<f64>,
}

impl SparseRows {
    pub fn from_dense(matrix: &Array2<f64>) -> Self {
        let n_rows = matrix.nrows();
        let mut offsets = Vec::with_capacity(n_rows + 1);
        let mut columns = Vec::new();
        let mut values = Vec::new();

        offsets.push(0);
        for row in matrix.rows() {
            for (col, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    columns.push(col);
                    values.push(value);
                }
            }
            offsets.push(columns.len());
        }

        Self {
            n_rows,
            offsets,
            columns,
            values,
        }
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Product with a dense block of column vectors
    pub fn dot(&self, block: &Array2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((self.n_rows, block.ncols()));
        for (row, mut out_row) in out.rows_mut().into_iter().enumerate() {
            for idx in self.offsets[row]..self.offsets[row + 1] {
                out_row.scaled_add(self.values[idx], &block.row(self.columns[idx]));
            }
        }
        out
    }
}

/// Leading `k` eigenpairs of a symmetric matrix by Chebyshev-filtered
/// subspace iteration
///
/// Each step runs Rayleigh-Ritz on the current block, then applies a
/// Chebyshev polynomial that damps the interval `[lower_bound, cutoff]`,
/// where `cutoff` is the smallest Ritz value in the block. `lower_bound` must
/// not exceed the smallest eigenvalue of `matrix`. Clustered spectra that
/// stall plain power steps converge in a few dozen filtered steps.
pub fn subspace_eigen<R: Rng>(
    matrix: &Array2<f64>,
    k: usize,
    lower_bound: f64,
    tol: f64,
    max_iter: usize,
    rng: &mut R,
) -> Result<EigenPairs> {
    let n = matrix.nrows();
    let k = k.min(n);
    if k == 0 {
        return Ok(EigenPairs {
            values: Array1::zeros(0),
            vectors: Array2::zeros((n, 0)),
        });
    }

    let block = (2 * k).max(k + 8).min(n);
    let operator = SparseRows::from_dense(matrix);
    log::debug!(
        "Subspace iteration on {} nonzeros with block size {}",
        operator.nnz(),
        block
    );

    let mut q = Array2::<f64>::from_shape_fn((n, block), |_| rng.gen_range(-1.0..1.0));
    orthonormalize(&mut q, rng);

    for iteration in 1..=max_iter {
        let z = operator.dot(&q);

        // Rayleigh-Ritz on the current subspace
        let projected = q.t().dot(&z);
        let ritz = jacobi_eigen(&symmetrize(projected), tol * 1e-2)?;
        let ritz_vectors = q.dot(&ritz.vectors);
        let images = z.dot(&ritz.vectors);

        let converged = (0..k).all(|j| {
            let lambda = ritz.values[j];
            let residual = &images.column(j) - &(&ritz_vectors.column(j) * lambda);
            norm(residual.view()) <= tol * lambda.abs().max(1.0)
        });

        if converged {
            log::debug!("Subspace iteration converged after {} iterations", iteration);
            return Ok(EigenPairs {
                values: ritz.values,
                vectors: ritz_vectors,
            }
            .truncate(k));
        }

        let cutoff = ritz.values[block - 1];
        q = if cutoff > lower_bound && ritz.values[k - 1] > cutoff {
            let degree = filter_degree(ritz.values[0], lower_bound, cutoff);
            chebyshev_filter(&operator, &ritz_vectors, degree, lower_bound, cutoff)
        } else {
            // Wanted and unwanted Ritz values not yet separated
            images
        };
        orthonormalize(&mut q, rng);
    }

    Err(PipelineError::EigenNotConverged {
        iterations: max_iter,
    })
}

/// Largest degree whose growth at `top` stays under `MAX_FILTER_GROWTH`
fn filter_degree(top: f64, lower: f64, upper: f64) -> usize {
    let center = (upper + lower) / 2.0;
    let half_width = (upper - lower) / 2.0;
    let x = (top - center) / half_width;
    if x <= 1.0 {
        return MAX_FILTER_DEGREE;
    }
    let degree = (MAX_FILTER_GROWTH.acosh() / x.acosh()).floor() as usize;
    degree.clamp(1, MAX_FILTER_DEGREE)
}

/// Apply the degree-`degree` Chebyshev polynomial mapped to `[lower, upper]`
///
/// Components with eigenvalues inside the interval stay bounded by 1 while
/// those above `upper` grow like `cosh(degree * acosh(x))`.
fn chebyshev_filter(
    operator: &SparseRows,
    block: &Array2<f64>,
    degree: usize,
    lower: f64,
    upper: f64,
) -> Array2<f64> {
    let center = (upper + lower) / 2.0;
    let half_width = (upper - lower) / 2.0;

    let mut previous = block.clone();
    let mut current = (operator.dot(block) - &(block * center)) / half_width;
    for _ in 1..degree {
        let next = (operator.dot(&current) - &(&current * center)) * (2.0 / half_width) - &previous;
        previous = current;
        current = next;
    }
    current
}

/// Orthonormalize the columns in place with two passes of modified
/// Gram-Schmidt; collapsed columns are replaced with random directions
fn orthonormalize<R: Rng>(q: &mut Array2<f64>, rng: &mut R) {
    let (n, m) = q.dim();
    for j in 0..m {
        for attempt in 0..3 {
            for _ in 0..2 {
                for i in 0..j {
                    let proj = q.column(i).dot(&q.column(j));
                    let basis = q.column(i).to_owned();
                    q.column_mut(j).scaled_add(-proj, &basis);
                }
            }

            let length = norm(q.column(j));
            if length > 1e-10 {
                q.column_mut(j).mapv_inplace(|x| x / length);
                break;
            }

            if attempt == 2 {
                log::warn!("Subspace column {} collapsed during orthonormalization", j);
            }
            for i in 0..n {
                q[[i, j]] = rng.gen_range(-1.0..1.0);
            }
        }
    }
}

fn sorted_pairs(values: Array1<f64>, vectors: Array2<f64>) -> EigenPairs {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    EigenPairs {
        values: order.iter().map(|&i| values[i]).collect(),
        vectors: vectors.select(Axis(1), &order),
    }
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    a.indexed_iter()
        .filter(|((i, j), _)| i != j)
        .map(|(_, x)| x * x)
        .sum::<f64>()
        .sqrt()
}

fn symmetrize(a: Array2<f64>) -> Array2<f64> {
    (&a + &a.t()) * 0.5
}

fn norm(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f64::consts::PI;

    /// Normalized adjacency of an n-cycle: every degree is 2
    fn ring(n: usize) -> Array2<f64> {
        let mut m = Array2::zeros((n, n));
        for i in 0..n {
            let j = (i + 1) % n;
            m[[i, j]] = 0.5;
            m[[j, i]] = 0.5;
        }
        m
    }

    fn assert_eigenpairs(matrix: &Array2<f64>, pairs: &EigenPairs, tol: f64) {
        for j in 0..pairs.values.len() {
            let v = pairs.vectors.column(j);
            let mv = matrix.dot(&v);
            for i in 0..v.len() {
                assert_abs_diff_eq!(mv[i], pairs.values[j] * v[i], epsilon = tol);
            }
            assert_abs_diff_eq!(norm(v), 1.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_jacobi_diagonal() {
        let m = array![[1.0, 0.0], [0.0, 3.0]];
        let pairs = jacobi_eigen(&m, 1e-12).unwrap();
        assert_eq!(pairs.values, array![3.0, 1.0]);
    }

    #[test]
    fn test_jacobi_two_by_two() {
        let m = array![[2.0, 1.0], [1.0, 2.0]];
        let pairs = jacobi_eigen(&m, 1e-12).unwrap();
        assert_abs_diff_eq!(pairs.values[0], 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(pairs.values[1], 1.0, epsilon = 1e-10);
        assert_eigenpairs(&m, &pairs, 1e-9);
    }

    #[test]
    fn test_jacobi_ring_spectrum() {
        let n = 12;
        let m = ring(n);
        let pairs = jacobi_eigen(&m, 1e-12).unwrap();

        let mut expected: Vec<f64> = (0..n).map(|j| (2.0 * PI * j as f64 / n as f64).cos()).collect();
        expected.sort_by(|a, b| b.total_cmp(a));
        for (got, want) in pairs.values.iter().zip(&expected) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-9);
        }
        assert_eigenpairs(&m, &pairs, 1e-8);
    }

    #[test]
    fn test_jacobi_empty() {
        let m: Array2<f64> = Array2::zeros((0, 0));
        let pairs = jacobi_eigen(&m, 1e-12).unwrap();
        assert_eq!(pairs.values.len(), 0);
    }

    #[test]
    fn test_subspace_matches_ring_spectrum() {
        let n = 30;
        let m = ring(n);
        let mut rng = StdRng::seed_from_u64(7);
        let pairs = subspace_eigen(&m, 3, -1.0, 1e-9, 5_000, &mut rng).unwrap();

        let second = (2.0 * PI / n as f64).cos();
        assert_eq!(pairs.values.len(), 3);
        assert_abs_diff_eq!(pairs.values[0], 1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(pairs.values[1], second, epsilon = 1e-7);
        assert_abs_diff_eq!(pairs.values[2], second, epsilon = 1e-7);
        assert_eigenpairs(&m, &pairs, 1e-6);
    }

    #[test]
    fn test_subspace_agrees_with_jacobi() {
        let n = 40;
        let mut m = ring(n);
        // Add a few chords so the spectrum is less regular
        for &(i, j) in &[(0, 20), (5, 17), (11, 33)] {
            m[[i, j]] = 0.3;
            m[[j, i]] = 0.3;
        }

        let dense = jacobi_eigen(&m, 1e-12).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let sub = subspace_eigen(&m, 4, -2.0, 1e-9, 5_000, &mut rng).unwrap();

        for j in 0..4 {
            assert_abs_diff_eq!(sub.values[j], dense.values[j], epsilon = 1e-7);
        }
    }

    /// Normalized adjacency of a path: endpoints have degree 1
    fn path(n: usize) -> Array2<f64> {
        let mut m = Array2::zeros((n, n));
        for i in 0..n - 1 {
            let degree_i: f64 = if i == 0 { 1.0 } else { 2.0 };
            let degree_j: f64 = if i + 1 == n - 1 { 1.0 } else { 2.0 };
            let w = 1.0 / (degree_i * degree_j).sqrt();
            m[[i, i + 1]] = w;
            m[[i + 1, i]] = w;
        }
        m
    }

    #[test]
    fn test_subspace_converges_on_long_path() {
        // Spectrum is cos(pi * j / (n - 1)), tightly bunched below 1
        let n = 500;
        let m = path(n);
        let mut rng = StdRng::seed_from_u64(1);
        let pairs = subspace_eigen(&m, 8, -1.0, 1e-8, 5_000, &mut rng).unwrap();

        for j in 0..8 {
            let expected = (PI * j as f64 / (n - 1) as f64).cos();
            assert_abs_diff_eq!(pairs.values[j], expected, epsilon = 1e-7);
        }
        assert_eigenpairs(&m, &pairs, 1e-6);
    }

    #[test]
    fn test_sparse_rows_dot_matches_dense() {
        let m = array![[0.0, 2.0, 0.0], [2.0, 0.0, -1.0], [0.0, -1.0, 3.0]];
        let block = array![[1.0, 0.5], [2.0, -1.0], [0.0, 4.0]];
        let sparse = SparseRows::from_dense(&m);

        assert_eq!(sparse.nnz(), 5);
        assert_eq!(sparse.dot(&block), m.dot(&block));
    }

    #[test]
    fn test_filter_degree_is_capped() {
        // Top of the spectrum far above the damped interval
        assert!(filter_degree(1.0, -1.0, -0.9) < MAX_FILTER_DEGREE);
        // Top barely above the interval
        assert_eq!(filter_degree(1.0, -1.0, 0.999), MAX_FILTER_DEGREE);
    }

    #[test]
    fn test_truncate() {
        let m = array![[3.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]];
        let pairs = jacobi_eigen(&m, 1e-12).unwrap().truncate(2);
        assert_eq!(pairs.values, array![3.0, 2.0]);
        assert_eq!(pairs.vectors.dim(), (3, 2));
    }
}
