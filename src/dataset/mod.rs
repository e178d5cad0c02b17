//! Validated observation storage.
//!
//! A [`SpatialDataset`] is the only way observations enter the estimation
//! pipeline. Construction is all-or-nothing: any non-finite record or any
//! unresolved duplicate location rejects the whole input.

use std::cmp::Ordering;

use serde::Serialize;

use crate::domain::{DatasetConfig, Location, Observation};
use crate::error::KrigeError;

/// Knots to metres per second, for callers converting wind speeds at ingest.
pub const KNOTS_TO_MPS: f64 = 0.514_444;

/// Summary stats about the observations (for windows and reports).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DatasetStats {
    pub n_points: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub value_min: f64,
    pub value_max: f64,
    pub value_mean: f64,
}

/// Immutable, validated set of observations.
#[derive(Debug, Clone)]
pub struct SpatialDataset {
    observations: Vec<Observation>,
    stats: DatasetStats,
}

impl SpatialDataset {
    /// Validate and store records in input order.
    pub fn load(
        records: impl IntoIterator<Item = Observation>,
        config: &DatasetConfig,
    ) -> Result<Self, KrigeError> {
        let observations: Vec<Observation> = records.into_iter().collect();
        if observations.is_empty() {
            return Err(KrigeError::Data("dataset has no observations".into()));
        }
        if !(config.duplicate_tolerance.is_finite() && config.duplicate_tolerance >= 0.0) {
            return Err(KrigeError::InvalidConfig(format!(
                "duplicate tolerance must be finite and >= 0, got {}",
                config.duplicate_tolerance
            )));
        }

        for (i, obs) in observations.iter().enumerate() {
            if !obs.location.is_finite() {
                return Err(KrigeError::Data(format!(
                    "record {i}: non-finite location ({}, {})",
                    obs.location.x, obs.location.y
                )));
            }
            if !obs.value.is_finite() {
                return Err(KrigeError::Data(format!(
                    "record {i}: non-finite value {}",
                    obs.value
                )));
            }
        }

        if !config.allow_duplicate_locations {
            if let Some((i, j)) = find_duplicate(&observations, config.duplicate_tolerance) {
                let loc = observations[i].location;
                return Err(KrigeError::Data(format!(
                    "records {i} and {j} share location ({:.3}, {:.3})",
                    loc.x, loc.y
                )));
            }
        }

        let stats = compute_stats(&observations);
        Ok(Self {
            observations,
            stats,
        })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn count(&self) -> usize {
        self.observations.len()
    }

    pub fn stats(&self) -> &DatasetStats {
        &self.stats
    }

    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.observations.iter().map(|o| o.location)
    }
}

/// First pair of records closer than `tol`, as `(earlier, later)` input indices.
///
/// Sort by x and sweep: only records within `tol` in x can collide.
fn find_duplicate(observations: &[Observation], tol: f64) -> Option<(usize, usize)> {
    let mut order: Vec<usize> = (0..observations.len()).collect();
    order.sort_by(|&a, &b| {
        observations[a]
            .location
            .x
            .partial_cmp(&observations[b].location.x)
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut best: Option<(usize, usize)> = None;
    for (k, &i) in order.iter().enumerate() {
        let li = observations[i].location;
        for &j in &order[k + 1..] {
            let lj = observations[j].location;
            if lj.x - li.x > tol {
                break;
            }
            if li.distance(&lj) <= tol {
                let pair = (i.min(j), i.max(j));
                if best.is_none_or(|b| pair < b) {
                    best = Some(pair);
                }
            }
        }
    }
    best
}

fn compute_stats(observations: &[Observation]) -> DatasetStats {
    let mut stats = DatasetStats {
        n_points: observations.len(),
        x_min: f64::INFINITY,
        x_max: f64::NEG_INFINITY,
        y_min: f64::INFINITY,
        y_max: f64::NEG_INFINITY,
        value_min: f64::INFINITY,
        value_max: f64::NEG_INFINITY,
        value_mean: 0.0,
    };
    let mut sum = 0.0;
    for o in observations {
        stats.x_min = stats.x_min.min(o.location.x);
        stats.x_max = stats.x_max.max(o.location.x);
        stats.y_min = stats.y_min.min(o.location.y);
        stats.y_max = stats.y_max.max(o.location.y);
        stats.value_min = stats.value_min.min(o.value);
        stats.value_max = stats.value_max.max(o.value);
        sum += o.value;
    }
    stats.value_mean = sum / observations.len() as f64;
    stats
}
