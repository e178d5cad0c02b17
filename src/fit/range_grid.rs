//! Starting ranges for multi-start fitting.
//!
//! The range enters the variogram non-linearly and the weighted objective can
//! have several basins, so each family is fitted from a small deterministic set
//! of log-spaced starting ranges.

use crate::error::KrigeError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, KrigeError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(KrigeError::InvalidConfig(format!(
            "invalid range span: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(KrigeError::InvalidConfig("log-space steps must be >= 2".into()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Starting ranges spanning a tenth of the largest lag up to the largest lag.
///
/// A single start falls back to a third of the largest lag.
pub fn start_ranges(max_lag: f64, steps: usize) -> Result<Vec<f64>, KrigeError> {
    if !(max_lag.is_finite() && max_lag > 0.0) {
        return Err(KrigeError::FitConvergence(format!(
            "largest lag must be finite and > 0, got {max_lag}"
        )));
    }
    match steps {
        0 => Err(KrigeError::InvalidConfig("need at least one starting range".into())),
        1 => Ok(vec![max_lag / 3.0]),
        n => log_space(max_lag / 10.0, max_lag, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
        assert!(v.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn start_ranges_cover_lag_span() {
        let v = start_ranges(300.0, 4).unwrap();
        assert_eq!(v.len(), 4);
        assert!((v[0] - 30.0).abs() < 1e-9);
        assert!((v[3] - 300.0).abs() < 1e-9);
        assert_eq!(start_ranges(300.0, 1).unwrap(), vec![100.0]);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(log_space(1.0, 1.0, 3).is_err());
        assert!(start_ranges(0.0, 3).is_err());
        assert!(start_ranges(10.0, 0).is_err());
    }
}
