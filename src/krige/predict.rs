//! Point and block prediction.
//!
//! Both entry points go through [`predict_target`]: a point is a target with a
//! single sample, a block is a target with its discretisation points and a
//! neighbourhood centred on the centroid.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{
    KrigingConfig, Location, Observation, PredictionMethod, PredictionResult, QueryRegion, Target,
    VariogramModel,
};
use crate::error::KrigeError;
use crate::krige::idw::{idw_block_estimate, idw_estimate};
use crate::krige::neighbors::{neighborhood, validate};
use crate::krige::system::solve_ordinary;

/// Predict the value at `query`.
///
/// With `model = None` this degrades to inverse distance weighting and the
/// result carries no variance.
pub fn predict_point(
    observations: &[Observation],
    model: Option<&VariogramModel>,
    query: Location,
    config: &KrigingConfig,
) -> Result<PredictionResult, KrigeError> {
    if !query.is_finite() {
        return Err(KrigeError::Data(format!(
            "non-finite query location ({}, {})",
            query.x, query.y
        )));
    }
    predict_target(observations, model, Target::Point(query), &[query], config)
}

/// Predict the mean value over `region` (block kriging).
pub fn predict_block(
    observations: &[Observation],
    model: Option<&VariogramModel>,
    region: &QueryRegion,
    config: &KrigingConfig,
) -> Result<PredictionResult, KrigeError> {
    let Some(centroid) = region.centroid() else {
        return Err(KrigeError::Data(format!(
            "region '{}' has no sample points",
            region.id
        )));
    };
    if region.points.iter().any(|p| !p.is_finite()) {
        return Err(KrigeError::Data(format!(
            "region '{}' has non-finite sample points",
            region.id
        )));
    }
    let target = Target::Region {
        id: region.id.clone(),
        centroid,
    };
    predict_target(observations, model, target, &region.points, config)
}

/// Predict many points in parallel; one result per query, in query order.
pub fn predict_points(
    observations: &[Observation],
    model: Option<&VariogramModel>,
    queries: &[Location],
    config: &KrigingConfig,
) -> Vec<Result<PredictionResult, KrigeError>> {
    queries
        .par_iter()
        .map(|&q| predict_point(observations, model, q, config))
        .collect()
}

/// Predict many regions in parallel; one result per region, in input order.
pub fn predict_blocks(
    observations: &[Observation],
    model: Option<&VariogramModel>,
    regions: &[QueryRegion],
    config: &KrigingConfig,
) -> Vec<Result<PredictionResult, KrigeError>> {
    regions
        .par_iter()
        .map(|r| predict_block(observations, model, r, config))
        .collect()
}

fn predict_target(
    observations: &[Observation],
    model: Option<&VariogramModel>,
    target: Target,
    samples: &[Location],
    config: &KrigingConfig,
) -> Result<PredictionResult, KrigeError> {
    if observations.is_empty() {
        return Err(KrigeError::Data("no observations to predict from".into()));
    }
    validate(config)?;

    let center = target.location();
    let nb = neighborhood(observations, center, samples, config)?;
    let locations = nb.locations(observations);
    let values = nb.values(observations);

    let Some(model) = model else {
        let value = match samples {
            [single] => idw_estimate(
                &locations,
                &values,
                *single,
                config.idw_power,
                config.duplicate_tolerance,
            ),
            _ => idw_block_estimate(
                &locations,
                &values,
                samples,
                config.idw_power,
                config.duplicate_tolerance,
            ),
        };
        return Ok(PredictionResult {
            target,
            value,
            variance: None,
            method: PredictionMethod::InverseDistance,
        });
    };

    let solution = solve_ordinary(
        model,
        &locations,
        samples,
        config.duplicate_tolerance,
        config.ridge,
    )?;
    let value: f64 = solution
        .weights
        .iter()
        .zip(&values)
        .map(|(l, z)| l * z)
        .sum();

    debug!(
        target = %target.label(),
        neighbors = nb.len(),
        value,
        variance = solution.variance,
        "kriged"
    );

    Ok(PredictionResult {
        target,
        value,
        variance: Some(solution.variance),
        method: PredictionMethod::OrdinaryKriging,
    })
}
