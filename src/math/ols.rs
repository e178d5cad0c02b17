//! Weighted least squares step solver.
//!
//! The variogram fitter repeatedly solves small linear least-squares problems of
//! the form:
//!
//! ```text
//! minimize ‖ A δ - b ‖²
//! ```
//!
//! where `A` stacks the weighted Jacobian on top of the Levenberg–Marquardt
//! damping rows. The parameter dimension is tiny (3 columns), so a full SVD is
//! cheap and copes with rank deficiency (e.g. a zero partial sill leaves the
//! range column identically zero).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
