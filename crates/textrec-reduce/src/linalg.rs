//! Small dense kernels used by the randomized SVD.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;

/// Columns whose residual after projection falls below this fraction of their
/// original norm are treated as linearly dependent and dropped.
pub const RANK_TOL: f64 = 1e-10;

const JACOBI_MAX_SWEEPS: usize = 100;

/// `rows × cols` matrix of independent standard normal samples.
pub fn gaussian_matrix(rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f64> {
    Array2::from_shape_simple_fn((rows, cols), || {
        // Box-Muller
        let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    })
}

fn norm(v: &Array1<f64>) -> f64 { v.dot(v).sqrt() }

/// Orthonormal basis of the column span of `a` (modified Gram-Schmidt with one
/// re-orthogonalization pass). Dependent columns are dropped, so the result may
/// have fewer columns than `a`, possibly none.
pub fn orthonormal_basis(a: &Array2<f64>) -> Array2<f64> {
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(a.ncols());
    for col in a.columns() {
        let mut v = col.to_owned();
        let original = norm(&v);
        if original == 0.0 || !original.is_finite() {
            continue;
        }
        for _ in 0..2 {
            for q in &basis {
                let proj = q.dot(&v);
                v.scaled_add(-proj, q);
            }
        }
        let residual = norm(&v);
        if residual > RANK_TOL * original {
            v /= residual;
            basis.push(v);
        }
    }

    let mut out = Array2::<f64>::zeros((a.nrows(), basis.len()));
    for (j, q) in basis.iter().enumerate() {
        out.column_mut(j).assign(q);
    }
    out
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns eigenvalues in descending order and the matching unit eigenvectors
/// as columns.
pub fn symmetric_eigen(a: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);
    let total: f64 = m.iter().map(|x| x * x).sum();

    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += m[[p, q]] * m[[p, q]];
            }
        }
        if off <= f64::EPSILON * f64::EPSILON * total {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = m[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (mkp, mkq) = (m[[k, p]], m[[k, q]]);
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let (mpk, mqk) = (m[[p, k]], m[[q, k]]);
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| m[[j, j]].total_cmp(&m[[i, i]]).then(i.cmp(&j)));

    let values = order.iter().map(|&i| m[[i, i]]).collect();
    let mut vectors = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        vectors.column_mut(dst).assign(&v.column(src));
    }
    (values, vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

    #[test]
    fn basis_is_orthonormal_and_drops_dependent_columns() {
        let a = array![[1.0, 2.0, 0.0], [0.0, 0.0, 1.0], [1.0, 2.0, 0.0]];
        let q = orthonormal_basis(&a);
        assert_eq!(q.ncols(), 2);
        let gram = q.t().dot(&q);
        for i in 0..2 {
            for j in 0..2 {
                assert!(close(gram[[i, j]], if i == j { 1.0 } else { 0.0 }));
            }
        }
    }

    #[test]
    fn zero_matrix_has_empty_basis() {
        let q = orthonormal_basis(&Array2::zeros((4, 3)));
        assert_eq!(q.dim(), (4, 0));
    }

    #[test]
    fn jacobi_recovers_known_spectrum() {
        let a = array![[2.0, 1.0, 0.0], [1.0, 2.0, 0.0], [0.0, 0.0, 5.0]];
        let (values, vectors) = symmetric_eigen(&a);
        assert!(close(values[0], 5.0));
        assert!(close(values[1], 3.0));
        assert!(close(values[2], 1.0));
        for (k, &lambda) in values.iter().enumerate() {
            let x = vectors.column(k).to_owned();
            let ax = a.dot(&x);
            for i in 0..3 {
                assert!(close(ax[i], lambda * x[i]));
            }
        }
    }

    #[test]
    fn gaussian_samples_are_seeded() {
        let a = gaussian_matrix(3, 2, &mut StdRng::seed_from_u64(7));
        let b = gaussian_matrix(3, 2, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.iter().all(|x| x.is_finite()));
    }
}
