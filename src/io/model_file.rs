//! Read/write variogram model JSON files.
//!
//! A model file is the portable result of `krige variogram`: the fitted model,
//! the empirical bins it was fitted to and a sampled curve for quick plotting.
//! `krige predict --model` and `krige simulate --model` read it back, so a
//! model can be fitted once and reused. The schema is `domain::ModelFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{ModelCurve, ModelFile, VariogramBin, VariogramModel};
use crate::error::KrigeError;
use crate::fit::fitted_curve;

const CURVE_POINTS: usize = 101;

/// Assemble the file contents for a fitted model.
pub fn model_file(
    model: &VariogramModel,
    weighted_sse: Option<f64>,
    bins: &[VariogramBin],
) -> ModelFile {
    let max_lag = bins
        .iter()
        .map(|b| b.lag_distance)
        .fold(model.range, f64::max);
    let lag: Vec<f64> = (0..CURVE_POINTS)
        .map(|i| max_lag * i as f64 / (CURVE_POINTS as f64 - 1.0))
        .collect();
    let semivariance = fitted_curve(model, &lag);

    ModelFile {
        tool: "krige".to_string(),
        model: *model,
        weighted_sse,
        bins: bins.to_vec(),
        curve: Some(ModelCurve { lag, semivariance }),
    }
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, file_contents: &ModelFile) -> Result<(), KrigeError> {
    let file = File::create(path).map_err(|e| {
        KrigeError::Io(format!("failed to create model JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, file_contents)
        .map_err(|e| KrigeError::Io(format!("failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file, re-validating the model parameters.
pub fn read_model_json(path: &Path) -> Result<ModelFile, KrigeError> {
    let file = File::open(path).map_err(|e| {
        KrigeError::Io(format!("failed to open model JSON '{}': {e}", path.display()))
    })?;
    parse_model_file(file)
}

pub fn parse_model_file<R: std::io::Read>(reader: R) -> Result<ModelFile, KrigeError> {
    let parsed: ModelFile = serde_json::from_reader(reader)
        .map_err(|e| KrigeError::Data(format!("invalid model JSON: {e}")))?;
    let m = parsed.model;
    VariogramModel::new(m.family, m.nugget, m.partial_sill, m.range)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelFamily;

    #[test]
    fn hand_written_model_needs_only_parameters() {
        let json = r#"{
            "tool": "manual",
            "model": {"family": "exponential", "nugget": 0.1, "partial_sill": 2.0, "range": 500.0}
        }"#;
        let f = parse_model_file(json.as_bytes()).unwrap();
        assert_eq!(f.model.family, ModelFamily::Exponential);
        assert!(f.bins.is_empty());
        assert!(f.weighted_sse.is_none());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let json = r#"{"tool": "x", "model": {"family": "gaussian", "nugget": -1.0, "partial_sill": 2.0, "range": 5.0}}"#;
        assert!(parse_model_file(json.as_bytes()).is_err());
    }

    #[test]
    fn curve_spans_bins_and_range() {
        let model = VariogramModel::new(ModelFamily::Spherical, 0.0, 1.0, 40.0).unwrap();
        let bins = vec![VariogramBin {
            lag_distance: 25.0,
            semivariance: 0.6,
            pair_count: 10,
            direction: None,
        }];
        let f = model_file(&model, Some(0.01), &bins);
        let curve = f.curve.unwrap();
        assert_eq!(curve.lag.len(), CURVE_POINTS);
        assert_eq!(*curve.lag.last().unwrap(), 40.0);
        assert_eq!(curve.semivariance[0], 0.0);
    }
}
