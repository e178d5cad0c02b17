//! Weighted least-squares fit of one variogram family.
//!
//! Given empirical bins `(h_i, γ̂_i, N_i)` we minimise
//!
//! ```text
//! Σ w_i (γ̂_i - γ(h_i; nugget, partial_sill, range))²,   w_i = N_i / h_i²
//! ```
//!
//! subject to `nugget >= 0`, `partial_sill >= 0`, `range > 0` (and an optional
//! upper range bound). The optimiser is a projected Levenberg–Marquardt:
//! parameters sitting on a bound with the descent direction pointing outward
//! are frozen for that iteration, every damped Gauss–Newton step is solved as
//! an augmented least-squares problem and projected back into the box.
//!
//! The range is stepped in `ln(range)` and each step may change it by at most
//! a factor of [`MAX_RANGE_FACTOR`]. A linear step in the range itself can
//! overshoot far below zero and land on the lower bound, where the range
//! derivative vanishes and the fit stalls as a pure nugget.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace};

use crate::domain::{ModelFamily, VariogramBin, VariogramModel};
use crate::error::KrigeError;
use crate::fit::range_grid::start_ranges;
use crate::math::solve_least_squares;
use crate::models::{gamma, shape, shape_d_range};

/// Three free parameters need at least three bins.
pub const MIN_BINS: usize = 3;

const N_PARAMS: usize = 3;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_MIN: f64 = 1e-12;
/// Relative step size below which the fit is considered stationary.
const XTOL: f64 = 1e-10;
/// Largest factor by which one step may grow or shrink the range.
pub const MAX_RANGE_FACTOR: f64 = 4.0;

/// Fitting options that affect how each model is calibrated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Outer Levenberg–Marquardt iterations before giving up.
    pub max_iterations: usize,
    /// Relative objective decrease below which the fit has converged.
    pub tolerance: f64,
    /// Upper bound on the range as a multiple of the largest bin lag.
    ///
    /// `None` leaves the range unbounded above. Data without a visible sill
    /// (a trend) otherwise drives the range and partial sill off to infinity.
    pub range_bound_factor: Option<f64>,
    /// Number of log-spaced starting ranges tried by [`fit_family`].
    pub starts: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-10,
            range_bound_factor: Some(1.0),
            starts: 4,
        }
    }
}

/// Best fit for a single model family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFit {
    pub model: VariogramModel,
    /// Objective value at the optimum.
    pub weighted_sse: f64,
    pub iterations: usize,
}

/// Bin data actually used by the objective.
#[derive(Debug, Clone)]
struct Problem {
    family: ModelFamily,
    lags: Vec<f64>,
    gammas: Vec<f64>,
    sqrt_w: Vec<f64>,
    lower: [f64; N_PARAMS],
    upper: [f64; N_PARAMS],
    /// Absolute scale per parameter for the step-size test.
    scale: [f64; N_PARAMS],
}

impl Problem {
    fn new(
        family: ModelFamily,
        bins: &[VariogramBin],
        opts: &FitOptions,
    ) -> Result<Self, KrigeError> {
        let usable: Vec<&VariogramBin> = bins
            .iter()
            .filter(|b| {
                b.pair_count > 0
                    && b.lag_distance.is_finite()
                    && b.lag_distance > 0.0
                    && b.semivariance.is_finite()
            })
            .collect();
        if usable.len() < MIN_BINS {
            return Err(KrigeError::FitConvergence(format!(
                "need at least {MIN_BINS} bins with positive lag to fit 3 parameters, got {}",
                usable.len()
            )));
        }

        let lags: Vec<f64> = usable.iter().map(|b| b.lag_distance).collect();
        let gammas: Vec<f64> = usable.iter().map(|b| b.semivariance).collect();
        let sqrt_w: Vec<f64> = usable
            .iter()
            .map(|b| (b.pair_count as f64).sqrt() / b.lag_distance)
            .collect();

        let max_lag = lags.iter().copied().fold(0.0_f64, f64::max);
        let max_gamma = gammas.iter().copied().fold(0.0_f64, f64::max);

        let range_upper = match opts.range_bound_factor {
            None => f64::INFINITY,
            Some(f) if f.is_finite() && f > 0.0 => f * max_lag,
            Some(f) => {
                return Err(KrigeError::InvalidConfig(format!(
                    "range bound factor must be finite and > 0, got {f}"
                )));
            }
        };

        let gamma_scale = max_gamma.max(f64::MIN_POSITIVE);
        Ok(Self {
            family,
            lags,
            gammas,
            sqrt_w,
            lower: [0.0, 0.0, 1e-9 * max_lag],
            upper: [f64::INFINITY, f64::INFINITY, range_upper],
            scale: [gamma_scale * XTOL, gamma_scale * XTOL, max_lag * XTOL],
        })
    }

    fn project(&self, theta: [f64; N_PARAMS]) -> [f64; N_PARAMS] {
        let mut out = theta;
        for j in 0..N_PARAMS {
            out[j] = out[j].clamp(self.lower[j], self.upper[j]);
        }
        out
    }

    fn objective(&self, theta: &[f64; N_PARAMS]) -> f64 {
        self.lags
            .iter()
            .zip(&self.gammas)
            .zip(&self.sqrt_w)
            .map(|((&h, &g), &sw)| {
                let r = sw * (g - gamma(self.family, h, theta[0], theta[1], theta[2]));
                r * r
            })
            .sum()
    }

    /// Weighted residuals `r` and Jacobian `J = ∂(weighted model)/∂θ`, with the
    /// range column taken with respect to `ln(range)`.
    fn linearize(&self, theta: &[f64; N_PARAMS]) -> (DMatrix<f64>, DVector<f64>) {
        let m = self.lags.len();
        let mut jac = DMatrix::<f64>::zeros(m, N_PARAMS);
        let mut res = DVector::<f64>::zeros(m);
        for i in 0..m {
            let h = self.lags[i];
            let sw = self.sqrt_w[i];
            let f = shape(self.family, h, theta[2]);
            jac[(i, 0)] = sw;
            jac[(i, 1)] = sw * f;
            jac[(i, 2)] = sw * theta[1] * theta[2] * shape_d_range(self.family, h, theta[2]);
            res[i] = sw * (self.gammas[i] - (theta[0] + theta[1] * f));
        }
        (jac, res)
    }
}

/// Fit `initial.family` to `bins`, starting from `initial`'s parameters.
///
/// The caller owns sanity checks against the starting guess; this only
/// guarantees a stationary point of the weighted objective inside the bounds.
pub fn fit_model(
    bins: &[VariogramBin],
    initial: &VariogramModel,
    opts: &FitOptions,
) -> Result<ModelFit, KrigeError> {
    let problem = Problem::new(initial.family, bins, opts)?;
    run_lm(&problem, [initial.nugget, initial.partial_sill, initial.range], opts)
}

/// Fit one family from a deterministic set of starting ranges (in parallel) and
/// keep the lowest objective.
pub fn fit_family(
    bins: &[VariogramBin],
    family: ModelFamily,
    opts: &FitOptions,
) -> Result<ModelFit, KrigeError> {
    let problem = Problem::new(family, bins, opts)?;
    let guess = initial_guess(bins, family)?;
    let max_lag = problem.lags.iter().copied().fold(0.0_f64, f64::max);
    let ranges = start_ranges(max_lag, opts.starts.max(1))?;

    let attempts: Vec<(usize, Result<ModelFit, KrigeError>)> = ranges
        .par_iter()
        .enumerate()
        .map(|(idx, &range)| {
            let start = [guess.nugget, guess.partial_sill, range];
            (idx, run_lm(&problem, start, opts))
        })
        .collect();

    // Deterministic selection: minimum objective, ties broken by start index.
    let mut best: Option<(usize, ModelFit)> = None;
    let mut first_err = None;
    for (idx, attempt) in attempts {
        match attempt {
            Ok(fit) => {
                let better = match &best {
                    None => true,
                    Some((bidx, b)) => {
                        fit.weighted_sse < b.weighted_sse
                            || (fit.weighted_sse == b.weighted_sse && idx < *bidx)
                    }
                };
                if better {
                    best = Some((idx, fit));
                }
            }
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    match (best, first_err) {
        (Some((_, fit)), _) => Ok(fit),
        (None, Some(e)) => Err(e),
        (None, None) => Err(KrigeError::FitConvergence(format!(
            "no starting point for {}",
            family.display_name()
        ))),
    }
}

/// Heuristic starting parameters read off the bins.
///
/// - sill: mean semivariance of the three longest lags
/// - nugget: half the shortest-lag semivariance (capped by the sill)
/// - range: a third of the longest lag
pub fn initial_guess(bins: &[VariogramBin], family: ModelFamily) -> Result<VariogramModel, KrigeError> {
    let mut usable: Vec<&VariogramBin> = bins
        .iter()
        .filter(|b| b.lag_distance.is_finite() && b.lag_distance > 0.0 && b.semivariance.is_finite())
        .collect();
    if usable.is_empty() {
        return Err(KrigeError::FitConvergence("no usable bins for a starting guess".into()));
    }
    usable.sort_by(|a, b| a.lag_distance.total_cmp(&b.lag_distance));

    let tail = &usable[usable.len().saturating_sub(3)..];
    let sill = (tail.iter().map(|b| b.semivariance).sum::<f64>() / tail.len() as f64).max(0.0);
    let nugget = (0.5 * usable[0].semivariance).clamp(0.0, 0.5 * sill);
    let partial_sill = (sill - nugget).max(0.1 * sill);
    let max_lag = usable[usable.len() - 1].lag_distance;

    VariogramModel::new(family, nugget, partial_sill, max_lag / 3.0)
}

fn run_lm(
    problem: &Problem,
    start: [f64; N_PARAMS],
    opts: &FitOptions,
) -> Result<ModelFit, KrigeError> {
    if opts.max_iterations == 0 {
        return Err(KrigeError::InvalidConfig("max iterations must be >= 1".into()));
    }
    if !(opts.tolerance.is_finite() && opts.tolerance >= 0.0) {
        return Err(KrigeError::InvalidConfig(format!(
            "fit tolerance must be finite and >= 0, got {}",
            opts.tolerance
        )));
    }
    if start.iter().any(|v| !v.is_finite()) {
        return Err(KrigeError::FitConvergence("non-finite starting parameters".into()));
    }

    let family = problem.family;
    let mut theta = problem.project(start);
    let mut cost = problem.objective(&theta);
    if !cost.is_finite() {
        return Err(KrigeError::FitConvergence(format!(
            "{}: objective is not finite at the starting point",
            family.display_name()
        )));
    }
    let mut lambda = LAMBDA_INIT;

    for iter in 1..=opts.max_iterations {
        if cost == 0.0 {
            return Ok(finish(family, theta, cost, iter - 1));
        }

        let (jac, res) = problem.linearize(&theta);
        let grad = jac.transpose() * &res;

        // Active set: freeze parameters pinned at a bound by the descent direction.
        let free: Vec<usize> = (0..N_PARAMS)
            .filter(|&j| {
                let at_lower = theta[j] <= problem.lower[j] && grad[j] <= 0.0;
                let at_upper = theta[j] >= problem.upper[j] && grad[j] >= 0.0;
                !(at_lower || at_upper)
            })
            .collect();
        if free.is_empty() {
            return Ok(finish(family, theta, cost, iter));
        }

        let jf = jac.select_columns(free.iter());
        let diag: Vec<f64> = (0..free.len())
            .map(|k| jf.column(k).norm_squared())
            .collect();
        let diag_floor = diag.iter().copied().fold(0.0_f64, f64::max).max(1.0) * 1e-12;

        let mut accepted = None;
        while lambda <= LAMBDA_MAX {
            let step = damped_step(&jf, &res, &diag, diag_floor, lambda);
            if let Some(step) = step {
                let mut trial = theta;
                for (k, &j) in free.iter().enumerate() {
                    if j == 2 {
                        let max_log = MAX_RANGE_FACTOR.ln();
                        trial[j] *= step[k].clamp(-max_log, max_log).exp();
                    } else {
                        trial[j] += step[k];
                    }
                }
                let trial = problem.project(trial);
                let trial_cost = problem.objective(&trial);
                if trial_cost.is_finite() && trial_cost < cost {
                    accepted = Some((trial, trial_cost));
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);
                    break;
                }
            }
            lambda *= 10.0;
        }

        let Some((next, next_cost)) = accepted else {
            // No damped step improves the objective: stationary within precision.
            debug!(family = family.display_name(), iter, cost, "fit stationary");
            return Ok(finish(family, theta, cost, iter));
        };

        let decrease = cost - next_cost;
        let small_step = (0..N_PARAMS)
            .all(|j| (next[j] - theta[j]).abs() <= XTOL * theta[j].abs() + problem.scale[j]);
        trace!(iter, cost = next_cost, lambda, "lm step accepted");

        theta = next;
        cost = next_cost;

        if decrease <= opts.tolerance * (cost + decrease) || small_step {
            debug!(
                family = family.display_name(),
                iter,
                weighted_sse = cost,
                "fit converged"
            );
            return Ok(finish(family, theta, cost, iter));
        }
    }

    Err(KrigeError::FitConvergence(format!(
        "{} fit did not converge within {} iterations",
        family.display_name(),
        opts.max_iterations
    )))
}

/// Solve `[J; sqrt(λ D)] δ ≈ [r; 0]` for the damped Gauss–Newton step.
fn damped_step(
    jf: &DMatrix<f64>,
    res: &DVector<f64>,
    diag: &[f64],
    diag_floor: f64,
    lambda: f64,
) -> Option<DVector<f64>> {
    let m = jf.nrows();
    let p = jf.ncols();
    let mut a = DMatrix::<f64>::zeros(m + p, p);
    a.view_mut((0, 0), (m, p)).copy_from(jf);
    for k in 0..p {
        a[(m + k, k)] = (lambda * diag[k].max(diag_floor)).sqrt();
    }
    let mut b = DVector::<f64>::zeros(m + p);
    b.rows_mut(0, m).copy_from(res);
    solve_least_squares(&a, &b)
}

fn finish(family: ModelFamily, theta: [f64; N_PARAMS], cost: f64, iterations: usize) -> ModelFit {
    ModelFit {
        model: VariogramModel {
            family,
            nugget: theta[0],
            partial_sill: theta[1],
            range: theta[2],
        },
        weighted_sse: cost,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_bins(model: &VariogramModel, lags: &[f64]) -> Vec<VariogramBin> {
        lags.iter()
            .enumerate()
            .map(|(i, &h)| VariogramBin {
                lag_distance: h,
                semivariance: model.gamma(h),
                pair_count: 20 + 5 * i,
                direction: None,
            })
            .collect()
    }

    #[test]
    fn recovers_exact_spherical_parameters() {
        let truth = VariogramModel::new(ModelFamily::Spherical, 1.0, 9.0, 40.0).unwrap();
        let lags: Vec<f64> = (1..=15).map(|i| i as f64 * 4.0).collect();
        let bins = synthetic_bins(&truth, &lags);

        let opts = FitOptions {
            range_bound_factor: None,
            ..Default::default()
        };
        let fit = fit_family(&bins, ModelFamily::Spherical, &opts).unwrap();
        assert!((fit.model.nugget - 1.0).abs() < 1e-3, "{:?}", fit.model);
        assert!((fit.model.partial_sill - 9.0).abs() < 1e-3, "{:?}", fit.model);
        assert!((fit.model.range - 40.0).abs() < 1e-2, "{:?}", fit.model);
        assert!(fit.weighted_sse < 1e-8);
    }

    #[test]
    fn recovers_exponential_from_rough_start() {
        let truth = VariogramModel::new(ModelFamily::Exponential, 0.0, 5.0, 12.0).unwrap();
        let lags: Vec<f64> = (1..=12).map(|i| i as f64 * 5.0).collect();
        let bins = synthetic_bins(&truth, &lags);

        let start = VariogramModel::new(ModelFamily::Exponential, 1.0, 2.0, 40.0).unwrap();
        let fit = fit_model(&bins, &start, &FitOptions::default()).unwrap();
        assert!(fit.model.nugget < 1e-3, "{:?}", fit.model);
        assert!((fit.model.partial_sill - 5.0).abs() < 1e-2, "{:?}", fit.model);
        assert!((fit.model.range - 12.0).abs() < 5e-2, "{:?}", fit.model);
    }

    #[test]
    fn overlong_starting_range_does_not_collapse() {
        let truth = VariogramModel::new(ModelFamily::Exponential, 0.0, 5.0, 12.0).unwrap();
        let lags: Vec<f64> = (1..=12).map(|i| i as f64 * 5.0).collect();
        let bins = synthetic_bins(&truth, &lags);
        let opts = FitOptions {
            range_bound_factor: None,
            ..Default::default()
        };

        for range in [0.5, 400.0, 2000.0] {
            let start = VariogramModel::new(ModelFamily::Exponential, 1.0, 2.0, range).unwrap();
            let fit = fit_model(&bins, &start, &opts).unwrap();
            assert!((fit.model.range - 12.0).abs() < 5e-2, "start {range}: {:?}", fit.model);
            assert!((fit.model.partial_sill - 5.0).abs() < 1e-2, "start {range}: {:?}", fit.model);
        }
    }

    #[test]
    fn respects_bounds() {
        // Decreasing semivariance pulls the partial sill negative when unconstrained.
        let bins: Vec<VariogramBin> = (1..=6)
            .map(|i| VariogramBin {
                lag_distance: i as f64,
                semivariance: 10.0 - i as f64,
                pair_count: 10,
                direction: None,
            })
            .collect();
        let fit = fit_family(&bins, ModelFamily::Gaussian, &FitOptions::default()).unwrap();
        assert!(fit.model.nugget >= 0.0);
        assert!(fit.model.partial_sill >= 0.0);
        assert!(fit.model.range > 0.0);
        assert!(fit.model.range <= 6.0 + 1e-12);
    }

    #[test]
    fn too_few_bins_is_a_convergence_error() {
        let truth = VariogramModel::new(ModelFamily::Gaussian, 0.0, 1.0, 10.0).unwrap();
        let bins = synthetic_bins(&truth, &[2.0, 4.0]);
        let err = fit_family(&bins, ModelFamily::Gaussian, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, KrigeError::FitConvergence(_)));
    }

    #[test]
    fn zero_lag_bins_are_ignored() {
        let truth = VariogramModel::new(ModelFamily::Gaussian, 0.0, 1.0, 10.0).unwrap();
        let mut bins = synthetic_bins(&truth, &[2.0, 4.0]);
        bins.insert(
            0,
            VariogramBin {
                lag_distance: 0.0,
                semivariance: 0.3,
                pair_count: 4,
                direction: None,
            },
        );
        assert!(matches!(
            fit_family(&bins, ModelFamily::Gaussian, &FitOptions::default()),
            Err(KrigeError::FitConvergence(_))
        ));
    }

    #[test]
    fn exhausted_budget_is_reported() {
        let truth = VariogramModel::new(ModelFamily::Gaussian, 0.5, 4.0, 20.0).unwrap();
        let lags: Vec<f64> = (1..=10).map(|i| i as f64 * 3.0).collect();
        let bins = synthetic_bins(&truth, &lags);
        let start = VariogramModel::new(ModelFamily::Gaussian, 3.0, 0.5, 2.0).unwrap();
        let opts = FitOptions {
            max_iterations: 1,
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            fit_model(&bins, &start, &opts),
            Err(KrigeError::FitConvergence(_))
        ));
    }

    #[test]
    fn initial_guess_reads_sill_from_tail() {
        let truth = VariogramModel::new(ModelFamily::Spherical, 0.0, 8.0, 10.0).unwrap();
        let lags: Vec<f64> = (1..=10).map(|i| i as f64 * 3.0).collect();
        let bins = synthetic_bins(&truth, &lags);
        let g = initial_guess(&bins, ModelFamily::Spherical).unwrap();
        assert!((g.sill() - 8.0).abs() < 1e-9);
        assert!((g.range - 10.0).abs() < 1e-9);
    }
}
