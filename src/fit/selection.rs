//! Model selection across variogram families.
//!
//! Every requested family is fitted independently. All families carry the same
//! three parameters, so the weighted SSE is directly comparable; the lowest one
//! wins and ties go to the family listed first.

use tracing::{info, warn};

use crate::domain::{ModelFamily, VariogramBin, VariogramModel};
use crate::error::KrigeError;
use crate::fit::fitter::{fit_family, FitOptions, ModelFit};

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: ModelFit,
    /// Fits for all families that converged, in request order.
    pub fits: Vec<ModelFit>,
    /// Families that failed to fit and why (for diagnostics).
    pub skipped: Vec<(ModelFamily, String)>,
}

/// Fit each family and select the best by weighted SSE.
///
/// Fails with the first family's error if no family converges. Configuration
/// errors are returned immediately rather than recorded as skips.
pub fn fit_and_select(
    bins: &[VariogramBin],
    families: &[ModelFamily],
    opts: &FitOptions,
) -> Result<FitSelection, KrigeError> {
    if families.is_empty() {
        return Err(KrigeError::InvalidConfig("no model families requested".into()));
    }

    let mut fits = Vec::new();
    let mut skipped = Vec::new();
    let mut first_err = None;

    for &family in families {
        match fit_family(bins, family, opts) {
            Ok(fit) => {
                info!(
                    family = family.display_name(),
                    nugget = fit.model.nugget,
                    partial_sill = fit.model.partial_sill,
                    range = fit.model.range,
                    weighted_sse = fit.weighted_sse,
                    "fitted variogram model"
                );
                fits.push(fit);
            }
            Err(err @ KrigeError::FitConvergence(_)) => {
                warn!(family = family.display_name(), error = %err, "model skipped");
                skipped.push((family, err.to_string()));
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
            Err(err) => return Err(err),
        }
    }

    let Some(best) = select_lowest(&fits) else {
        return Err(first_err.unwrap_or_else(|| {
            KrigeError::FitConvergence("no variogram family could be fitted".into())
        }));
    };

    Ok(FitSelection {
        best: best.clone(),
        fits,
        skipped,
    })
}

fn select_lowest(fits: &[ModelFit]) -> Option<&ModelFit> {
    let mut best: Option<&ModelFit> = None;
    for f in fits {
        // Strict comparison keeps the earliest family on ties.
        if best.is_none_or(|b| f.weighted_sse < b.weighted_sse) {
            best = Some(f);
        }
    }
    best
}

/// Model semivariance at each lag, for plots and reports.
pub fn fitted_curve(model: &VariogramModel, lags: &[f64]) -> Vec<f64> {
    lags.iter().map(|&h| model.gamma(h)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bins_from(model: &VariogramModel, n: usize, step: f64) -> Vec<VariogramBin> {
        (1..=n)
            .map(|i| {
                let h = i as f64 * step;
                VariogramBin {
                    lag_distance: h,
                    semivariance: model.gamma(h),
                    pair_count: 30,
                    direction: None,
                }
            })
            .collect()
    }

    #[test]
    fn selects_generating_family() {
        let truth = VariogramModel::new(ModelFamily::Exponential, 0.2, 3.0, 15.0).unwrap();
        let bins = bins_from(&truth, 15, 4.0);
        let sel = fit_and_select(&bins, &ModelFamily::ALL, &FitOptions::default()).unwrap();
        assert_eq!(sel.best.model.family, ModelFamily::Exponential);
        assert_eq!(sel.fits.len(), 3);
        assert!(sel.skipped.is_empty());
    }

    #[test]
    fn ties_go_to_first_family() {
        let a = ModelFit {
            model: VariogramModel::new(ModelFamily::Gaussian, 0.0, 1.0, 1.0).unwrap(),
            weighted_sse: 1.0,
            iterations: 3,
        };
        let mut b = a.clone();
        b.model.family = ModelFamily::Spherical;
        let fits = [a, b];
        assert_eq!(select_lowest(&fits).unwrap().model.family, ModelFamily::Gaussian);
    }

    #[test]
    fn all_failures_surface_the_fit_error() {
        let truth = VariogramModel::new(ModelFamily::Spherical, 0.0, 1.0, 5.0).unwrap();
        let bins = bins_from(&truth, 2, 1.0);
        let err = fit_and_select(&bins, &ModelFamily::ALL, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, KrigeError::FitConvergence(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn fitted_curve_starts_at_nugget() {
        let m = VariogramModel::new(ModelFamily::Spherical, 0.5, 2.0, 10.0).unwrap();
        let curve = fitted_curve(&m, &[0.0, 10.0, 20.0]);
        assert_eq!(curve[0], 0.5);
        assert!((curve[1] - 2.5).abs() < 1e-12);
        assert!((curve[2] - 2.5).abs() < 1e-12);
    }
}
