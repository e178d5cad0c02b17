//! Ordinary and simple kriging systems.
//!
//! Ordinary kriging is solved in semivariogram form:
//!
//! ```text
//! [Γ  1] [λ]   [γ̄₀]
//! [1ᵀ 0] [μ] = [ 1 ]
//! ```
//!
//! where `Γᵢⱼ = γ(xᵢ, xⱼ)` and `γ̄₀ᵢ` is the mean semivariance between `xᵢ`
//! and the target samples. A point target is a single sample; a block is
//! represented by its discretisation points. The estimation variance is
//!
//! ```text
//! σ² = Σ λᵢ γ̄₀ᵢ + μ − γ̄(B, B)
//! ```
//!
//! with `γ̄(B, B)` the mean semivariance over all pairs of target samples
//! (zero for a point).

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::domain::{Location, VariogramModel};
use crate::error::KrigeError;
use crate::math::solve_dense;

/// Weights and variance from one ordinary kriging solve.
#[derive(Debug, Clone, PartialEq)]
pub struct OrdinarySolution {
    pub weights: Vec<f64>,
    pub lagrange: f64,
    /// Estimation variance, clamped to be non-negative.
    pub variance: f64,
}

/// Solve the ordinary kriging system for `targets` from observations at
/// `locations`.
///
/// A singular system fails with [`KrigeError::SingularSystem`] unless `ridge`
/// is set, in which case the solve is retried once with `ridge` added to the
/// covariance diagonal (i.e. subtracted from `Γ`'s diagonal).
pub fn solve_ordinary(
    model: &VariogramModel,
    locations: &[Location],
    targets: &[Location],
    tolerance: f64,
    ridge: Option<f64>,
) -> Result<OrdinarySolution, KrigeError> {
    let n = locations.len();
    if n == 0 || targets.is_empty() {
        return Err(KrigeError::InvalidConfig(
            "kriging needs at least one observation and one target sample".into(),
        ));
    }

    let gamma0 = mean_semivariance_to(model, locations, targets, tolerance);
    let self_term = mean_pairwise_semivariance(model, targets, tolerance);

    let mut a = DMatrix::<f64>::zeros(n + 1, n + 1);
    for i in 0..n {
        for j in (i + 1)..n {
            let g = model.semivariance_between(locations[i].distance(&locations[j]), tolerance);
            a[(i, j)] = g;
            a[(j, i)] = g;
        }
        a[(i, n)] = 1.0;
        a[(n, i)] = 1.0;
    }

    let mut b = DVector::<f64>::zeros(n + 1);
    b.rows_mut(0, n).copy_from(&gamma0);
    b[n] = 1.0;

    let x = solve_with_ridge(a, &b, n, -1.0, ridge)?;
    let weights: Vec<f64> = x.rows(0, n).iter().copied().collect();
    let lagrange = x[n];
    let raw = weights
        .iter()
        .zip(gamma0.iter())
        .map(|(l, g)| l * g)
        .sum::<f64>()
        + lagrange
        - self_term;

    Ok(OrdinarySolution {
        weights,
        lagrange,
        variance: raw.max(0.0),
    })
}

/// Simple kriging weights `C λ = c₀` for one target location.
pub fn simple_weights(
    model: &VariogramModel,
    locations: &[Location],
    target: Location,
    tolerance: f64,
    ridge: Option<f64>,
) -> Result<Vec<f64>, KrigeError> {
    let n = locations.len();
    if n == 0 {
        return Err(KrigeError::InvalidConfig(
            "simple kriging needs at least one observation".into(),
        ));
    }

    let mut c = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        c[(i, i)] = model.sill();
        for j in (i + 1)..n {
            let v = model.covariance(locations[i].distance(&locations[j]), tolerance);
            c[(i, j)] = v;
            c[(j, i)] = v;
        }
    }
    let c0 = DVector::from_iterator(
        n,
        locations
            .iter()
            .map(|l| model.covariance(l.distance(&target), tolerance)),
    );

    let x = solve_with_ridge(c, &c0, n, 1.0, ridge)?;
    Ok(x.iter().copied().collect())
}

/// `γ̄₀ᵢ`: mean semivariance between observation `i` and the target samples.
fn mean_semivariance_to(
    model: &VariogramModel,
    locations: &[Location],
    targets: &[Location],
    tolerance: f64,
) -> DVector<f64> {
    let m = targets.len() as f64;
    DVector::from_iterator(
        locations.len(),
        locations.iter().map(|x| {
            targets
                .iter()
                .map(|t| model.semivariance_between(x.distance(t), tolerance))
                .sum::<f64>()
                / m
        }),
    )
}

/// `γ̄(B, B)`: mean semivariance over all ordered pairs of target samples.
fn mean_pairwise_semivariance(model: &VariogramModel, targets: &[Location], tolerance: f64) -> f64 {
    let m = targets.len();
    if m < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    for k in 0..m {
        for l in (k + 1)..m {
            sum += 2.0 * model.semivariance_between(targets[k].distance(&targets[l]), tolerance);
        }
    }
    sum / (m * m) as f64
}

/// Solve `a x = b`; on failure retry once with `sign * ridge` added to the
/// first `n_diag` diagonal entries.
fn solve_with_ridge(
    a: DMatrix<f64>,
    b: &DVector<f64>,
    n_diag: usize,
    sign: f64,
    ridge: Option<f64>,
) -> Result<DVector<f64>, KrigeError> {
    let fallback = ridge.map(|r| {
        let mut reg = a.clone();
        for i in 0..n_diag {
            reg[(i, i)] += sign * r;
        }
        (r, reg)
    });

    if let Some(x) = solve_dense(a, b) {
        return Ok(x);
    }

    let Some((r, reg)) = fallback else {
        return Err(KrigeError::SingularSystem(format!(
            "{n_diag} observations give a singular system (coincident or redundant locations?)"
        )));
    };

    warn!(ridge = r, n = n_diag, "singular kriging system, retrying with ridge");
    solve_dense(reg, b).ok_or_else(|| {
        KrigeError::SingularSystem(format!(
            "{n_diag} observations give a singular system even with ridge {r}"
        ))
    })
}
