//! Dense solvers for kriging systems and simulation covariances.
//!
//! Kriging systems in semivariogram form carry a zero diagonal and a Lagrange
//! row, so they are indefinite: we use LU with partial pivoting and report a
//! negligible pivot as singular instead of regularising silently. Simulation
//! covariances are symmetric positive semi-definite and go through Cholesky.

use nalgebra::{DMatrix, DVector};

/// Pivots smaller than this fraction of the largest pivot count as zero.
const PIVOT_RTOL: f64 = 1e-13;

/// Relative diagonal jitter levels tried when a covariance is not numerically PD.
const JITTER_LEVELS: [f64; 6] = [0.0, 1e-12, 1e-10, 1e-8, 1e-6, 1e-4];

/// Solve a square system `A x = b`.
///
/// Returns `None` when `A` is singular to working precision or the solution is
/// not finite.
pub fn solve_dense(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() || a.nrows() == 0 {
        return None;
    }

    let lu = a.lu();
    let u = lu.u();
    let mut max_pivot = 0.0_f64;
    let mut min_pivot = f64::INFINITY;
    for i in 0..u.nrows() {
        let p = u[(i, i)].abs();
        max_pivot = max_pivot.max(p);
        min_pivot = min_pivot.min(p);
    }
    if !(max_pivot.is_finite() && max_pivot > 0.0) || min_pivot <= PIVOT_RTOL * max_pivot {
        return None;
    }

    let x = lu.solve(b)?;
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Lower Cholesky factor of a covariance matrix.
///
/// Coincident or nearly collinear locations make the covariance only
/// semi-definite; we retry with a growing diagonal jitter (relative to the
/// largest diagonal entry) and report the jitter that was needed.
pub fn cholesky_with_jitter(cov: &DMatrix<f64>) -> Option<(DMatrix<f64>, f64)> {
    let n = cov.nrows();
    if n == 0 || n != cov.ncols() {
        return None;
    }
    let scale = (0..n).map(|i| cov[(i, i)].abs()).fold(0.0_f64, f64::max);
    if !scale.is_finite() {
        return None;
    }
    let scale = if scale > 0.0 { scale } else { 1.0 };

    for &level in &JITTER_LEVELS {
        let jitter = level * scale;
        let mut m = cov.clone();
        for i in 0..n {
            m[(i, i)] += jitter;
        }
        if let Some(chol) = m.cholesky() {
            return Some((chol.l(), jitter));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_small_system() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_row_slice(&[5.0, 7.0]);
        let x = solve_dense(a, &b).unwrap();
        assert!((x[0] - 1.6).abs() < 1e-12, "x[0] = {}", x[0]);
        assert!((x[1] - 1.8).abs() < 1e-12, "x[1] = {}", x[1]);
    }

    #[test]
    fn solves_lagrange_system_with_zero_diagonal() {
        // [0 1 1; 1 0 1; 1 1 0] x = [1; 1; 1]
        let a = DMatrix::from_row_slice(3, 3, &[0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0]);
        let b = DVector::from_row_slice(&[1.0, 1.0, 1.0]);
        let x = solve_dense(a, &b).unwrap();
        for v in x.iter() {
            assert!((v - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn reports_singular_matrix() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(solve_dense(a, &b).is_none());
    }

    #[test]
    fn cholesky_jitters_semi_definite_covariance() {
        // Two perfectly correlated variables.
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let (l, jitter) = cholesky_with_jitter(&cov).unwrap();
        assert!(jitter > 0.0);
        let rebuilt = &l * l.transpose();
        assert!((rebuilt[(0, 1)] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cholesky_of_identity_needs_no_jitter() {
        let cov = DMatrix::<f64>::identity(3, 3);
        let (l, jitter) = cholesky_with_jitter(&cov).unwrap();
        assert_eq!(jitter, 0.0);
        assert!((l[(2, 2)] - 1.0).abs() < 1e-12);
    }
}
