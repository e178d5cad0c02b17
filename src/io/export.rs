//! Export predictions and simulations to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or by an
//! external map renderer.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{Location, PredictionMethod, PredictionResult, Target};
use crate::error::KrigeError;

/// One row per query. Failed queries keep their row with an `error` message.
pub fn write_predictions_csv(
    path: &Path,
    results: &[Result<PredictionResult, KrigeError>],
) -> Result<(), KrigeError> {
    let file = File::create(path).map_err(|e| {
        KrigeError::Io(format!("failed to create predictions CSV '{}': {e}", path.display()))
    })?;
    write_predictions(file, results)
}

pub fn write_predictions<W: Write>(
    writer: W,
    results: &[Result<PredictionResult, KrigeError>],
) -> Result<(), KrigeError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["target", "x", "y", "value", "variance", "method", "error"])
        .map_err(write_err)?;

    for r in results {
        let row = match r {
            Ok(p) => {
                let loc = p.target.location();
                [
                    target_id(&p.target),
                    format!("{:.3}", loc.x),
                    format!("{:.3}", loc.y),
                    format!("{:.6}", p.value),
                    p.variance.map(|v| format!("{v:.6}")).unwrap_or_default(),
                    method_label(p.method).to_string(),
                    String::new(),
                ]
            }
            Err(e) => [
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                e.to_string(),
            ],
        };
        w.write_record(&row).map_err(write_err)?;
    }

    w.flush()
        .map_err(|e| KrigeError::Io(format!("failed to flush predictions CSV: {e}")))?;
    Ok(())
}

/// Wide layout: one row per query, one `sim_k` column per realisation.
pub fn write_simulations_csv(
    path: &Path,
    queries: &[Location],
    realisations: &[Vec<f64>],
) -> Result<(), KrigeError> {
    let file = File::create(path).map_err(|e| {
        KrigeError::Io(format!("failed to create simulation CSV '{}': {e}", path.display()))
    })?;
    write_simulations(file, queries, realisations)
}

pub fn write_simulations<W: Write>(
    writer: W,
    queries: &[Location],
    realisations: &[Vec<f64>],
) -> Result<(), KrigeError> {
    let mut w = csv::Writer::from_writer(writer);

    let mut header = vec!["x".to_string(), "y".to_string()];
    header.extend((1..=realisations.len()).map(|k| format!("sim_{k}")));
    w.write_record(&header).map_err(write_err)?;

    for (qi, q) in queries.iter().enumerate() {
        let mut row = vec![format!("{:.3}", q.x), format!("{:.3}", q.y)];
        for real in realisations {
            let v = real.get(qi).ok_or_else(|| {
                KrigeError::Io(format!("realisation has no value for query {qi}"))
            })?;
            row.push(format!("{v:.6}"));
        }
        w.write_record(&row).map_err(write_err)?;
    }

    w.flush()
        .map_err(|e| KrigeError::Io(format!("failed to flush simulation CSV: {e}")))?;
    Ok(())
}

fn target_id(target: &Target) -> String {
    match target {
        Target::Point(_) => String::new(),
        Target::Region { id, .. } => id.clone(),
    }
}

fn method_label(method: PredictionMethod) -> &'static str {
    match method {
        PredictionMethod::OrdinaryKriging => "ordinary_kriging",
        PredictionMethod::InverseDistance => "inverse_distance",
    }
}

fn write_err(e: csv::Error) -> KrigeError {
    KrigeError::Io(format!("failed to write CSV row: {e}"))
}
