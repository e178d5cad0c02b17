//! Inverse distance weighting, the degraded mode used without a variogram.
//!
//! ```text
//! z(x) = Σ wᵢ zᵢ / Σ wᵢ,   wᵢ = 1 / d(x, xᵢ)^p
//! ```
//!
//! A target within the duplicate tolerance of an observation takes its value.

use crate::domain::Location;

/// IDW estimate at `target`. `locations` must be non-empty.
pub fn idw_estimate(
    locations: &[Location],
    values: &[f64],
    target: Location,
    power: f64,
    snap_distance: f64,
) -> f64 {
    let mut sum_w = 0.0;
    let mut sum_wz = 0.0;
    for (loc, &z) in locations.iter().zip(values) {
        let d = loc.distance(&target);
        if d <= snap_distance {
            return z;
        }
        let w = 1.0 / d.powf(power);
        sum_w += w;
        sum_wz += w * z;
    }
    sum_wz / sum_w
}

/// Block IDW: the mean of the per-sample estimates.
pub fn idw_block_estimate(
    locations: &[Location],
    values: &[f64],
    samples: &[Location],
    power: f64,
    snap_distance: f64,
) -> f64 {
    let total: f64 = samples
        .iter()
        .map(|&s| idw_estimate(locations, values, s, power, snap_distance))
        .sum();
    total / samples.len() as f64
}
