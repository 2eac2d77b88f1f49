//! Linear algebra helpers for covariance bookkeeping.
//!
//! Public API:
//!     pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64>
//!     pub fn spd_solve(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Option<DMatrix<f64>>
//!     pub fn reciprocal_condition(eigenvalues: &[f64]) -> f64
//!     pub fn min_eigenvalue(m: &DMatrix<f64>) -> f64
//!
//! Solves are plain Cholesky with no diagonal jitter. A matrix that is not positive definite
//! is reported as `None` so that the caller can decline the update instead of applying a
//! regularized gain.
use nalgebra::DMatrix;
use nalgebra::linalg::{Cholesky, SymmetricEigen};

/// Symmetrize a square matrix, P ← ½ (P + Pᵀ).
///
/// Removes the asymmetric round-off that accumulates in covariance products.
#[inline]
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (m + m.transpose())
}
/// Solve A X = B for symmetric positive definite A via Cholesky.
///
/// A is symmetrized first. Returns `None` if the factorization fails.
pub fn spd_solve(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    assert!(a.is_square(), "spd_solve: A must be square");
    assert_eq!(a.nrows(), b.nrows(), "spd_solve: A and B incompatible");
    Cholesky::new(symmetrize(a)).map(|ch| ch.solve(b))
}
/// Ratio of the smallest to the largest eigenvalue of a symmetric matrix.
///
/// Returns 0.0 when the largest eigenvalue is not positive.
pub fn reciprocal_condition(eigenvalues: &[f64]) -> f64 {
    let max = eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    if max > 0.0 { min / max } else { 0.0 }
}
/// Smallest eigenvalue of a symmetric matrix.
pub fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
    SymmetricEigen::new(symmetrize(m)).eigenvalues.min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn t_symmetrize() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 3.0]);
        let s = symmetrize(&m);
        assert_eq!(s, DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 3.0]));
    }
    #[test]
    fn t_spd_solve() {
        let a = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 0.5, 0.0, 1.0, -1.0, 0.0, 0.0, 0.2]);
        let p = &a * a.transpose();
        let b = DMatrix::from_row_slice(3, 1, &[1.0, -2.0, 0.5]);
        let x = spd_solve(&p, &b).unwrap();
        let back = &p * &x;
        for i in 0..3 {
            assert_approx_eq!(back[(i, 0)], b[(i, 0)], 1e-10);
        }
    }
    #[test]
    fn t_spd_solve_rejects_singular() {
        let p = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        assert!(spd_solve(&p, &b).is_none());
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert!(spd_solve(&indefinite, &b).is_none());
    }
    #[test]
    fn t_conditioning() {
        assert_approx_eq!(reciprocal_condition(&[4.0, 1e-3, 2.0]), 2.5e-4, 1e-15);
        assert_eq!(reciprocal_condition(&[0.0, -1.0]), 0.0);
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        assert_approx_eq!(min_eigenvalue(&m), 1.0, 1e-12);
    }
}
