//! Search neighbourhoods.
//!
//! A neighbourhood is a set of observation indices used for one target. It is
//! centred on the target location (the centroid for blocks), filtered by the
//! optional search radius and truncated to the nearest `neighbor_limit`
//! observations, ties broken by input index.

use std::cmp::Ordering;

use crate::domain::{KrigingConfig, Location, Observation};
use crate::error::KrigeError;

/// Largest neighbourhood solved without an explicit `neighbor_limit`.
pub const MAX_GLOBAL_NEIGHBORHOOD: usize = 500;

/// Observations selected for one target, as indices into the input slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood {
    pub indices: Vec<usize>,
}

impl Neighborhood {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn locations(&self, observations: &[Observation]) -> Vec<Location> {
        self.indices.iter().map(|&i| observations[i].location).collect()
    }

    pub fn values(&self, observations: &[Observation]) -> Vec<f64> {
        self.indices.iter().map(|&i| observations[i].value).collect()
    }
}

pub(crate) fn validate(config: &KrigingConfig) -> Result<(), KrigeError> {
    if config.neighbor_limit == Some(0) {
        return Err(KrigeError::InvalidConfig("neighbor limit must be >= 1".into()));
    }
    if let Some(r) = config.max_radius {
        if !(r.is_finite() && r > 0.0) {
            return Err(KrigeError::InvalidConfig(format!(
                "max radius must be finite and > 0, got {r}"
            )));
        }
    }
    if let Some(r) = config.ridge {
        if !(r.is_finite() && r > 0.0) {
            return Err(KrigeError::InvalidConfig(format!(
                "ridge must be finite and > 0, got {r}"
            )));
        }
    }
    if !(config.idw_power.is_finite() && config.idw_power >= 0.0) {
        return Err(KrigeError::InvalidConfig(format!(
            "IDW power must be finite and >= 0, got {}",
            config.idw_power
        )));
    }
    if !(config.duplicate_tolerance.is_finite() && config.duplicate_tolerance >= 0.0) {
        return Err(KrigeError::InvalidConfig(format!(
            "duplicate tolerance must be finite and >= 0, got {}",
            config.duplicate_tolerance
        )));
    }
    Ok(())
}

/// Select the observations used for a target centred at `center`, then check
/// the target samples against coincident observations.
///
/// Coincident observations carrying equal values collapse to the earliest one.
/// A target sample coinciding with observations that disagree is ill-posed and
/// fails with [`KrigeError::DuplicateLocation`].
pub fn neighborhood(
    observations: &[Observation],
    center: Location,
    samples: &[Location],
    config: &KrigingConfig,
) -> Result<Neighborhood, KrigeError> {
    let tol = config.duplicate_tolerance;

    let mut candidates: Vec<(usize, f64)> = observations
        .iter()
        .enumerate()
        .map(|(i, o)| (i, o.location.distance(&center)))
        .collect();
    if let Some(r) = config.max_radius {
        candidates.retain(|&(_, d)| d <= r);
    }

    match config.neighbor_limit {
        Some(k) if candidates.len() > k => {
            candidates.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            candidates.truncate(k);
        }
        Some(_) => {}
        None if candidates.len() > MAX_GLOBAL_NEIGHBORHOOD => {
            return Err(KrigeError::InvalidConfig(format!(
                "{} observations in a global neighbourhood; set a neighbor limit (at most {MAX_GLOBAL_NEIGHBORHOOD} without one)",
                candidates.len()
            )));
        }
        None => {}
    }

    let mut indices: Vec<usize> = candidates.into_iter().map(|(i, _)| i).collect();
    indices.sort_unstable();
    let indices = collapse_equal_duplicates(observations, indices, tol);

    if indices.is_empty() {
        return Err(KrigeError::EmptyNeighborhood {
            x: center.x,
            y: center.y,
        });
    }

    for s in samples {
        let count = indices
            .iter()
            .filter(|&&i| observations[i].location.distance(s) <= tol)
            .count();
        if count > 1 {
            return Err(KrigeError::DuplicateLocation {
                x: s.x,
                y: s.y,
                count,
            });
        }
    }

    Ok(Neighborhood { indices })
}

/// Drop later observations that coincide with an earlier kept one and carry
/// the same value. Disagreeing duplicates are kept.
fn collapse_equal_duplicates(
    observations: &[Observation],
    indices: Vec<usize>,
    tol: f64,
) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(indices.len());
    for i in indices {
        let oi = observations[i];
        let redundant = kept.iter().any(|&j| {
            let oj = observations[j];
            oj.value == oi.value && oj.location.distance(&oi.location) <= tol
        });
        if !redundant {
            kept.push(i);
        }
    }
    kept
}
