//! Empirical (experimental) semivariogram.
//!
//! ```text
//! γ(h) = 1 / (2·N(h)) · Σ (z_i - z_j)²   over pairs with |x_i - x_j| in the lag class of h
//! ```
//!
//! Pair enumeration is O(n²). Work is split into fixed blocks of rows that are
//! evaluated in parallel and merged in block order, so the floating-point sums
//! (and therefore the bins) are identical from one call to the next.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{DirectionBands, LagSpec, Observation, VariogramBin, VariogramConfig};
use crate::error::KrigeError;
use crate::math::{axial_difference_deg, azimuth_deg, fold_180};

/// Rows of the pair triangle handled by one parallel task.
const ROWS_PER_BLOCK: usize = 32;

/// Default maximum lag as a fraction of the largest pairwise distance.
const DEFAULT_MAX_LAG_FRACTION: f64 = 1.0 / 3.0;

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum_sq: f64,
    sum_h: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, h: f64, sq: f64) {
        self.sum_sq += sq;
        self.sum_h += h;
        self.count += 1;
    }

    fn merge(&mut self, other: &Accumulator) {
        self.sum_sq += other.sum_sq;
        self.sum_h += other.sum_h;
        self.count += other.count;
    }
}

/// Resolved binning layout.
#[derive(Debug, Clone)]
struct Layout {
    max_lag: f64,
    width: f64,
    n_bins: usize,
    /// `None` for the omnidirectional class.
    bands: Vec<Option<f64>>,
    tolerance_deg: f64,
}

impl Layout {
    fn bin_of(&self, h: f64) -> Option<usize> {
        if h > self.max_lag {
            return None;
        }
        Some(((h / self.width) as usize).min(self.n_bins - 1))
    }
}

/// Compute the empirical variogram of `observations`.
///
/// Bins are ordered by direction band (config order), then ascending lag.
/// Empty bins are omitted.
pub fn compute(
    observations: &[Observation],
    config: &VariogramConfig,
) -> Result<Vec<VariogramBin>, KrigeError> {
    let n = observations.len();
    if n < 2 {
        return Err(KrigeError::Data(format!(
            "need at least 2 observations for a variogram, got {n}"
        )));
    }

    let layout = resolve_layout(observations, config)?;
    let n_cells = layout.bands.len() * layout.n_bins;

    let block_starts: Vec<usize> = (0..n).step_by(ROWS_PER_BLOCK).collect();
    let partials: Vec<Vec<Accumulator>> = block_starts
        .par_iter()
        .map(|&start| {
            let end = (start + ROWS_PER_BLOCK).min(n);
            accumulate_rows(observations, start..end, &layout, n_cells)
        })
        .collect();

    let mut totals = vec![Accumulator::default(); n_cells];
    for partial in &partials {
        for (t, p) in totals.iter_mut().zip(partial) {
            t.merge(p);
        }
    }

    let mut bins = Vec::new();
    for (b, band) in layout.bands.iter().enumerate() {
        for k in 0..layout.n_bins {
            let acc = &totals[b * layout.n_bins + k];
            if acc.count == 0 {
                continue;
            }
            let count = acc.count as f64;
            bins.push(VariogramBin {
                lag_distance: acc.sum_h / count,
                semivariance: acc.sum_sq / (2.0 * count),
                pair_count: acc.count,
                direction: *band,
            });
        }
    }

    debug!(
        observations = n,
        max_lag = layout.max_lag,
        bin_width = layout.width,
        bins = bins.len(),
        "empirical variogram computed"
    );
    Ok(bins)
}

/// Largest distance between any two observations.
pub fn max_pairwise_distance(observations: &[Observation]) -> f64 {
    (0..observations.len())
        .into_par_iter()
        .map(|i| {
            let li = observations[i].location;
            observations[i + 1..]
                .iter()
                .map(|o| li.distance(&o.location))
                .fold(0.0_f64, f64::max)
        })
        .reduce(|| 0.0_f64, f64::max)
}

fn resolve_layout(
    observations: &[Observation],
    config: &VariogramConfig,
) -> Result<Layout, KrigeError> {
    let max_lag = match config.max_lag {
        Some(m) => m,
        None => {
            let d = max_pairwise_distance(observations);
            if d <= 0.0 {
                return Err(KrigeError::Data(
                    "all observations share one location; no lag structure".into(),
                ));
            }
            d * DEFAULT_MAX_LAG_FRACTION
        }
    };
    if !(max_lag.is_finite() && max_lag > 0.0) {
        return Err(KrigeError::InvalidConfig(format!(
            "max lag must be finite and > 0, got {max_lag}"
        )));
    }

    let (width, n_bins) = match config.lags {
        LagSpec::Count(k) => {
            if k == 0 {
                return Err(KrigeError::InvalidConfig("lag count must be >= 1".into()));
            }
            (max_lag / k as f64, k)
        }
        LagSpec::Width(w) => {
            if !(w.is_finite() && w > 0.0) {
                return Err(KrigeError::InvalidConfig(format!(
                    "lag width must be finite and > 0, got {w}"
                )));
            }
            (w, ((max_lag / w).ceil() as usize).max(1))
        }
    };

    let (bands, tolerance_deg) = match &config.directions {
        None => (vec![None], 90.0),
        Some(d) => resolve_bands(d)?,
    };

    Ok(Layout {
        max_lag,
        width,
        n_bins,
        bands,
        tolerance_deg,
    })
}

fn resolve_bands(d: &DirectionBands) -> Result<(Vec<Option<f64>>, f64), KrigeError> {
    if d.centers_deg.is_empty() {
        return Err(KrigeError::InvalidConfig(
            "direction bands need at least one centre".into(),
        ));
    }
    if !(d.tolerance_deg.is_finite() && d.tolerance_deg > 0.0 && d.tolerance_deg <= 90.0) {
        return Err(KrigeError::InvalidConfig(format!(
            "direction tolerance must be in (0, 90] degrees, got {}",
            d.tolerance_deg
        )));
    }
    if d.centers_deg.iter().any(|c| !c.is_finite()) {
        return Err(KrigeError::InvalidConfig(
            "direction centres must be finite".into(),
        ));
    }
    let bands = d.centers_deg.iter().map(|&c| Some(fold_180(c))).collect();
    Ok((bands, d.tolerance_deg))
}

fn accumulate_rows(
    observations: &[Observation],
    rows: std::ops::Range<usize>,
    layout: &Layout,
    n_cells: usize,
) -> Vec<Accumulator> {
    let mut acc = vec![Accumulator::default(); n_cells];
    let directional = layout.bands.iter().any(Option::is_some);

    for i in rows {
        let oi = &observations[i];
        for oj in &observations[i + 1..] {
            let dx = oj.location.x - oi.location.x;
            let dy = oj.location.y - oi.location.y;
            let h = dx.hypot(dy);
            let Some(k) = layout.bin_of(h) else {
                continue;
            };
            let dz = oi.value - oj.value;
            let sq = dz * dz;

            if !directional {
                acc[k].add(h, sq);
                continue;
            }

            // Coincident pairs have no direction and count towards every band.
            let azimuth = (h > 0.0).then(|| azimuth_deg(dx, dy));
            for (b, center) in layout.bands.iter().enumerate() {
                let inside = match (azimuth, center) {
                    (Some(az), Some(c)) => axial_difference_deg(az, *c) <= layout.tolerance_deg,
                    _ => true,
                };
                if inside {
                    acc[b * layout.n_bins + k].add(h, sq);
                }
            }
        }
    }

    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand::rngs::StdRng;

    fn scattered(n: usize, seed: u64) -> Vec<Observation> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let x: f64 = rng.gen_range(0.0..100.0);
                let y: f64 = rng.gen_range(0.0..100.0);
                let v = 0.5 * x + 0.3 * y + 10.0 * ((x / 20.0).sin() + (y / 20.0).sin());
                Observation::new(x, y, v)
            })
            .collect()
    }

    #[test]
    fn bins_are_non_negative_and_ascending() {
        let obs = scattered(120, 7);
        let bins = compute(&obs, &VariogramConfig::default()).unwrap();
        assert!(bins.len() >= 10);
        for w in bins.windows(2) {
            assert!(w[0].lag_distance < w[1].lag_distance);
        }
        for b in &bins {
            assert!(b.semivariance >= 0.0);
            assert!(b.pair_count >= 1);
            assert!(b.direction.is_none());
        }
    }

    #[test]
    fn pair_counts_are_conserved() {
        let obs = scattered(80, 11);
        let max_lag = 40.0;
        let config = VariogramConfig {
            max_lag: Some(max_lag),
            lags: LagSpec::Width(3.0),
            directions: None,
        };
        let bins = compute(&obs, &config).unwrap();

        let mut discarded = 0usize;
        for i in 0..obs.len() {
            for j in (i + 1)..obs.len() {
                if obs[i].location.distance(&obs[j].location) > max_lag {
                    discarded += 1;
                }
            }
        }
        let binned: usize = bins.iter().map(|b| b.pair_count).sum();
        let n = obs.len();
        assert_eq!(binned + discarded, n * (n - 1) / 2);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let obs = scattered(300, 3);
        let config = VariogramConfig {
            directions: Some(DirectionBands::cardinal()),
            ..Default::default()
        };
        let a = compute(&obs, &config).unwrap();
        let b = compute(&obs, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn semivariance_matches_hand_computation() {
        // Three collinear points, one lag class covering everything.
        let obs = vec![
            Observation::new(0.0, 0.0, 1.0),
            Observation::new(1.0, 0.0, 3.0),
            Observation::new(2.0, 0.0, 4.0),
        ];
        let config = VariogramConfig {
            max_lag: Some(2.0),
            lags: LagSpec::Count(1),
            directions: None,
        };
        let bins = compute(&obs, &config).unwrap();
        assert_eq!(bins.len(), 1);
        // (4 + 9 + 1) / (2 * 3)
        assert!((bins[0].semivariance - 14.0 / 6.0).abs() < 1e-12);
        assert!((bins[0].lag_distance - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(bins[0].pair_count, 3);
    }

    #[test]
    fn direction_bands_split_pairs_by_azimuth() {
        // East-west pairs vary, north-south pairs are flat.
        let mut obs = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                obs.push(Observation::new(i as f64, j as f64, i as f64));
            }
        }
        let config = VariogramConfig {
            max_lag: Some(3.0),
            lags: LagSpec::Width(1.0),
            directions: Some(DirectionBands {
                centers_deg: vec![0.0, 90.0],
                tolerance_deg: 10.0,
            }),
        };
        let bins = compute(&obs, &config).unwrap();
        let north: Vec<_> = bins.iter().filter(|b| b.direction == Some(0.0)).collect();
        let east: Vec<_> = bins.iter().filter(|b| b.direction == Some(90.0)).collect();
        assert!(!north.is_empty() && !east.is_empty());
        assert!(north.iter().all(|b| b.semivariance == 0.0));
        assert!(east.iter().all(|b| b.semivariance > 0.0));

        // Grouped by band in config order.
        let first_east = bins.iter().position(|b| b.direction == Some(90.0)).unwrap();
        assert!(bins[..first_east].iter().all(|b| b.direction == Some(0.0)));
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let one = vec![Observation::new(0.0, 0.0, 1.0)];
        assert!(compute(&one, &VariogramConfig::default()).is_err());

        let same = vec![Observation::new(0.0, 0.0, 1.0), Observation::new(0.0, 0.0, 2.0)];
        assert!(matches!(
            compute(&same, &VariogramConfig::default()),
            Err(KrigeError::Data(_))
        ));

        let obs = scattered(10, 1);
        let bad = VariogramConfig {
            lags: LagSpec::Count(0),
            ..Default::default()
        };
        assert!(matches!(compute(&obs, &bad), Err(KrigeError::InvalidConfig(_))));
    }
}
