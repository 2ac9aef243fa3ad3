//! Randomized truncated SVD of a sparse document-term matrix.
//!
//! Fitting finds the top right singular vectors of the TF-IDF matrix `X`
//! (`n_docs × vocabulary`); transforming projects rows onto them, so a
//! document maps to `x · Vᵀ`, the same projection at build and query time.
//!
//! The range of `X` is sampled with a seeded Gaussian test matrix, refined by
//! a few power iterations, and the small projected problem `B·Bᵀ` (with
//! `B = Qᵀ·X`) is solved exactly with Jacobi rotations.

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use textrec_core::error::{Error, Result};
use textrec_core::sparse::{SparseMatrix, SparseRow};
use tracing::{info, warn};

use crate::linalg::{gaussian_matrix, orthonormal_basis, symmetric_eigen, RANK_TOL};

/// Output dimensionality for a requested target: never more than
/// `vocabulary_size - 1`.
pub fn effective_dims(target: usize, vocabulary_size: usize) -> usize {
    target.min(vocabulary_size.saturating_sub(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvdOptions {
    /// Extra random directions sampled beyond the target rank.
    pub oversampling: usize,
    pub power_iterations: usize,
    pub seed: u64,
}

impl Default for SvdOptions {
    fn default() -> Self { Self { oversampling: 10, power_iterations: 5, seed: 42 } }
}

impl SvdOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruncatedSvd {
    requested_components: usize,
    /// `n_components × n_features`; rows past the numerical rank are zero.
    components: Array2<f64>,
    singular_values: Vec<f64>,
}

impl TruncatedSvd {
    /// Fit `target_dims` components on `matrix`, after clamping the target to
    /// `n_features - 1`. A clamp is logged; [`was_clamped`](Self::was_clamped)
    /// reports it afterwards.
    pub fn fit(matrix: &SparseMatrix, target_dims: usize, options: SvdOptions) -> Result<Self> {
        let (n_docs, n_features) = matrix.shape();
        if n_docs < 2 {
            return Err(Error::data(format!("need at least 2 documents to fit the reducer, got {n_docs}")));
        }
        let dims = effective_dims(target_dims, n_features);
        if dims < 1 {
            return Err(Error::data(format!(
                "reduced dimensionality must be >= 1 (target {target_dims}, vocabulary {n_features})"
            )));
        }
        if dims < target_dims {
            warn!(
                requested = target_dims,
                actual = dims,
                vocabulary = n_features,
                "Reduced dimensionality clamped to vocabulary size - 1"
            );
        }

        let sample = (dims + options.oversampling).min(n_features).min(n_docs).max(1);
        let mut rng = StdRng::seed_from_u64(options.seed);

        // Q spans (approximately) the dominant column space of X.
        let omega = gaussian_matrix(n_features, sample, &mut rng);
        let mut q = orthonormal_basis(&matrix.mul_dense(&omega));
        for _ in 0..options.power_iterations {
            if q.ncols() == 0 {
                break;
            }
            let z = orthonormal_basis(&matrix.transpose_mul_dense(&q));
            q = orthonormal_basis(&matrix.mul_dense(&z));
        }

        let mut components = Array2::<f64>::zeros((dims, n_features));
        let mut singular_values = vec![0.0; dims];
        if q.ncols() > 0 {
            // Bᵀ = Xᵀ·Q, so B·Bᵀ = (Bᵀ)ᵀ·Bᵀ is only `sample × sample`.
            let bt = matrix.transpose_mul_dense(&q);
            let gram = bt.t().dot(&bt);
            let (eigenvalues, eigenvectors) = symmetric_eigen(&gram);
            let sigma_max = eigenvalues.first().copied().unwrap_or(0.0).max(0.0).sqrt();

            for (k, &lambda) in eigenvalues.iter().take(dims).enumerate() {
                let sigma = lambda.max(0.0).sqrt();
                if sigma <= RANK_TOL * sigma_max || sigma == 0.0 {
                    break;
                }
                let mut v = bt.dot(&eigenvectors.column(k)) / sigma;
                flip_sign(&mut v);
                components.row_mut(k).assign(&v);
                singular_values[k] = sigma;
            }
        }

        let rank = singular_values.iter().filter(|s| **s > 0.0).count();
        info!(
            documents = n_docs,
            features = n_features,
            requested = target_dims,
            dims,
            rank,
            "Fitted truncated SVD"
        );
        Ok(Self { requested_components: target_dims, components, singular_values })
    }

    /// Dense projection of every row, shape `(n_rows, n_components)`.
    pub fn transform(&self, matrix: &SparseMatrix) -> Result<Array2<f32>> {
        self.check_features(matrix.n_cols())?;
        let projected = matrix.mul_dense(&self.components.t().to_owned());
        Ok(projected.mapv(|x| x as f32))
    }

    /// Projection of a single sparse row.
    pub fn transform_row(&self, row: SparseRow<'_>) -> Vec<f32> {
        let mut out = vec![0.0f64; self.n_components()];
        for (col, value) in row.iter() {
            if col >= self.n_features() {
                continue;
            }
            for (o, c) in out.iter_mut().zip(self.components.column(col).iter()) {
                *o += value * c;
            }
        }
        out.into_iter().map(|x| x as f32).collect()
    }

    fn check_features(&self, n_cols: usize) -> Result<()> {
        if n_cols != self.n_features() {
            return Err(Error::artifact(format!(
                "reducer expects {} input features, got {n_cols}",
                self.n_features()
            )));
        }
        Ok(())
    }

    pub fn n_components(&self) -> usize { self.components.len_of(Axis(0)) }
    pub fn n_features(&self) -> usize { self.components.len_of(Axis(1)) }
    pub fn requested_components(&self) -> usize { self.requested_components }
    pub fn was_clamped(&self) -> bool { self.n_components() < self.requested_components }
    pub fn components(&self) -> &Array2<f64> { &self.components }
    pub fn singular_values(&self) -> &[f64] { &self.singular_values }
}

/// Make the largest-magnitude entry positive so repeated fits agree.
fn flip_sign(v: &mut ndarray::Array1<f64>) {
    let pivot = v.iter().copied().fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonalish() -> SparseMatrix {
        SparseMatrix::from_rows(
            4,
            vec![vec![(0, 3.0)], vec![(1, 2.0)], vec![(2, 1.0)], vec![(0, 3.0), (3, 0.5)]],
        )
    }

    #[test]
    fn effective_dims_clamps_to_vocabulary_minus_one() {
        assert_eq!(effective_dims(50, 6), 5);
        assert_eq!(effective_dims(3, 6), 3);
        assert_eq!(effective_dims(5, 1), 0);
        assert_eq!(effective_dims(5, 0), 0);
    }

    #[test]
    fn clamp_is_recorded() {
        let svd = TruncatedSvd::fit(&diagonalish(), 10, SvdOptions::default()).unwrap();
        assert_eq!(svd.n_components(), 3);
        assert_eq!(svd.requested_components(), 10);
        assert!(svd.was_clamped());
        let svd = TruncatedSvd::fit(&diagonalish(), 2, SvdOptions::default()).unwrap();
        assert!(!svd.was_clamped());
    }

    #[test]
    fn singular_values_are_sorted_and_components_orthonormal() {
        let svd = TruncatedSvd::fit(&diagonalish(), 3, SvdOptions::default()).unwrap();
        let s = svd.singular_values();
        assert!(s.windows(2).all(|w| w[0] >= w[1]));
        let c = svd.components();
        let gram = c.dot(&c.t());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-8, "gram[{i},{j}] = {}", gram[[i, j]]);
            }
        }
    }

    #[test]
    fn transform_row_matches_batch_transform() {
        let m = diagonalish();
        let svd = TruncatedSvd::fit(&m, 3, SvdOptions::default()).unwrap();
        let batch = svd.transform(&m).unwrap();
        for i in 0..m.n_rows() {
            let single = svd.transform_row(m.row(i));
            for (a, b) in single.iter().zip(batch.row(i).iter()) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn degenerate_inputs_are_data_errors() {
        let one_doc = SparseMatrix::from_rows(3, vec![vec![(0, 1.0)]]);
        assert!(matches!(TruncatedSvd::fit(&one_doc, 2, SvdOptions::default()), Err(Error::Data(_))));
        let one_term = SparseMatrix::from_rows(1, vec![vec![(0, 1.0)], vec![(0, 1.0)]]);
        assert!(matches!(TruncatedSvd::fit(&one_term, 2, SvdOptions::default()), Err(Error::Data(_))));
    }

    #[test]
    fn feature_mismatch_is_an_artifact_error() {
        let svd = TruncatedSvd::fit(&diagonalish(), 2, SvdOptions::default()).unwrap();
        let wrong = SparseMatrix::from_rows(7, vec![vec![(6, 1.0)]]);
        assert!(matches!(svd.transform(&wrong), Err(Error::Artifact(_))));
    }
}
