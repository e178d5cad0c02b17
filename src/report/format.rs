//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the variogram/kriging code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::dataset::DatasetStats;
use crate::domain::{PredictionMethod, PredictionResult, VariogramBin, VariogramModel};
use crate::error::KrigeError;
use crate::fit::FitSelection;

/// Aggregate view of a prediction batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSummary {
    pub total: usize,
    pub kriged: usize,
    pub inverse_distance: usize,
    pub failed: usize,
    pub value_range: Option<(f64, f64)>,
    pub variance_range: Option<(f64, f64)>,
    /// Distinct failure messages with their counts, in first-seen order.
    pub failures: Vec<(String, usize)>,
}

pub fn summarize_predictions(results: &[Result<PredictionResult, KrigeError>]) -> PredictionSummary {
    let mut s = PredictionSummary {
        total: results.len(),
        kriged: 0,
        inverse_distance: 0,
        failed: 0,
        value_range: None,
        variance_range: None,
        failures: Vec::new(),
    };

    for r in results {
        match r {
            Ok(p) => {
                match p.method {
                    PredictionMethod::OrdinaryKriging => s.kriged += 1,
                    PredictionMethod::InverseDistance => s.inverse_distance += 1,
                }
                s.value_range = Some(widen(s.value_range, p.value));
                if let Some(v) = p.variance {
                    s.variance_range = Some(widen(s.variance_range, v));
                }
            }
            Err(e) => {
                s.failed += 1;
                let msg = e.to_string();
                match s.failures.iter_mut().find(|(m, _)| *m == msg) {
                    Some((_, n)) => *n += 1,
                    None => s.failures.push((msg, 1)),
                }
            }
        }
    }
    s
}

fn widen(range: Option<(f64, f64)>, v: f64) -> (f64, f64) {
    match range {
        None => (v, v),
        Some((lo, hi)) => (lo.min(v), hi.max(v)),
    }
}

/// Dataset header for every subcommand.
pub fn format_dataset_summary(stats: &DatasetStats, rows_read: usize) -> String {
    let mut out = String::new();
    out.push_str("=== krige - ordinary kriging ===\n");
    out.push_str(&format!(
        "Points: n={} (rows read {rows_read}) | x=[{:.1}, {:.1}] | y=[{:.1}, {:.1}]\n",
        stats.n_points, stats.x_min, stats.x_max, stats.y_min, stats.y_max
    ));
    out.push_str(&format!(
        "Values: [{:.4}, {:.4}] mean={:.4}\n",
        stats.value_min, stats.value_max, stats.value_mean
    ));
    out
}

/// Empirical variogram table.
pub fn format_variogram_table(bins: &[VariogramBin]) -> String {
    let mut out = String::new();
    out.push_str("Empirical variogram:\n");
    out.push_str(&format!(
        "{:>10} {:>14} {:>14} {:>8}\n",
        "direction", "lag", "semivariance", "pairs"
    ));
    out.push_str(&format!("{:-<10} {:-<14} {:-<14} {:-<8}\n", "", "", "", ""));
    for b in bins {
        let dir = b
            .direction
            .map(|d| format!("{d:.1}"))
            .unwrap_or_else(|| "omni".to_string());
        out.push_str(&format!(
            "{:>10} {:>14.3} {:>14.6} {:>8}\n",
            dir, b.lag_distance, b.semivariance, b.pair_count
        ));
    }
    out
}

/// Per-family fit diagnostics and the chosen model.
pub fn format_fit_summary(selection: &FitSelection) -> String {
    let mut out = String::new();
    out.push_str("\nModel diagnostics:\n");
    for fit in &selection.fits {
        let chosen = if fit.model.family == selection.best.model.family {
            "*"
        } else {
            " "
        };
        out.push_str(&format!(
            "{chosen} {:<12} WSSE={:.6e} iterations={}\n",
            fit.model.family.display_name(),
            fit.weighted_sse,
            fit.iterations
        ));
    }
    for (family, reason) in &selection.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", family.display_name()));
    }
    out.push('\n');
    out.push_str(&format_model(&selection.best.model, "Chosen model"));
    out
}

/// Model parameters block.
pub fn format_model(model: &VariogramModel, title: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title}:\n"));
    out.push_str(&format!("- family      : {}\n", model.family.display_name()));
    out.push_str(&format!("- nugget      : {:.6}\n", model.nugget));
    out.push_str(&format!("- partial sill: {:.6}\n", model.partial_sill));
    out.push_str(&format!("- sill        : {:.6}\n", model.sill()));
    out.push_str(&format!("- range       : {:.3}\n", model.range));
    out
}

pub fn format_prediction_summary(summary: &PredictionSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nPredictions: {} targets | kriged={} idw={} failed={}\n",
        summary.total, summary.kriged, summary.inverse_distance, summary.failed
    ));
    if let Some((lo, hi)) = summary.value_range {
        out.push_str(&format!("- value    : [{lo:.4}, {hi:.4}]\n"));
    }
    match summary.variance_range {
        Some((lo, hi)) => out.push_str(&format!("- variance : [{lo:.6}, {hi:.6}]\n")),
        None if summary.inverse_distance > 0 => {
            out.push_str("- variance : unavailable (inverse distance fallback)\n")
        }
        None => {}
    }
    for (msg, n) in &summary.failures {
        out.push_str(&format!("  ({n}x) {msg}\n"));
    }
    out
}

/// Per-query mean and spread across realisations.
pub fn format_simulation_summary(realisations: &[Vec<f64>], n_queries: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nSimulation: {} realisations x {} queries\n",
        realisations.len(),
        n_queries
    ));
    if realisations.is_empty() || n_queries == 0 {
        return out;
    }

    let k = realisations.len() as f64;
    let mut mean_spread = 0.0;
    for q in 0..n_queries {
        let vals = realisations.iter().map(|r| r[q]);
        let mean = vals.clone().sum::<f64>() / k;
        let var = vals.map(|v| (v - mean).powi(2)).sum::<f64>() / k;
        mean_spread += var.sqrt();
    }
    out.push_str(&format!(
        "- mean per-query std dev: {:.6}\n",
        mean_spread / n_queries as f64
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, ModelFamily, Target};

    fn ok(value: f64, variance: Option<f64>) -> Result<PredictionResult, KrigeError> {
        Ok(PredictionResult {
            target: Target::Point(Location::new(0.0, 0.0)),
            value,
            variance,
            method: if variance.is_some() {
                PredictionMethod::OrdinaryKriging
            } else {
                PredictionMethod::InverseDistance
            },
        })
    }

    #[test]
    fn summary_counts_methods_and_failures() {
        let results = vec![
            ok(1.0, Some(0.5)),
            ok(3.0, Some(0.1)),
            ok(2.0, None),
            Err(KrigeError::EmptyNeighborhood { x: 1.0, y: 1.0 }),
            Err(KrigeError::EmptyNeighborhood { x: 1.0, y: 1.0 }),
        ];
        let s = summarize_predictions(&results);
        assert_eq!((s.total, s.kriged, s.inverse_distance, s.failed), (5, 2, 1, 2));
        assert_eq!(s.value_range, Some((1.0, 3.0)));
        assert_eq!(s.variance_range, Some((0.1, 0.5)));
        assert_eq!(s.failures.len(), 1);
        assert_eq!(s.failures[0].1, 2);
    }

    #[test]
    fn idw_only_batch_reports_unavailable_variance() {
        let s = summarize_predictions(&[ok(1.0, None)]);
        assert!(format_prediction_summary(&s).contains("unavailable"));
    }

    #[test]
    fn variogram_table_labels_directions() {
        let bins = vec![
            VariogramBin {
                lag_distance: 1.0,
                semivariance: 0.5,
                pair_count: 3,
                direction: None,
            },
            VariogramBin {
                lag_distance: 2.0,
                semivariance: 0.7,
                pair_count: 4,
                direction: Some(45.0),
            },
        ];
        let txt = format_variogram_table(&bins);
        assert!(txt.contains("omni"));
        assert!(txt.contains("45.0"));
        assert_eq!(txt.lines().count(), 5);
    }

    #[test]
    fn model_block_shows_sill() {
        let m = VariogramModel::new(ModelFamily::Gaussian, 1.0, 2.5, 100.0).unwrap();
        assert!(format_model(&m, "Model").contains("sill        : 3.500000"));
    }
}
