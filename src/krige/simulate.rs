//! Conditional Gaussian simulation.
//!
//! Each realisation draws an unconditional field `y` jointly at the
//! observations and the queries (Cholesky of the model covariance), then
//! conditions it by simple-kriging the residual:
//!
//! ```text
//! s(q) = m + Σ λᵢ (zᵢ − m) + y(q) − Σ λᵢ y(xᵢ)
//! ```
//!
//! The simple-kriging weights do not depend on the draw, so they are solved
//! once per query and shared by all realisations.

use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{Location, Observation, SimulationConfig, VariogramModel};
use crate::error::KrigeError;
use crate::krige::neighbors::{neighborhood, validate};
use crate::krige::system::simple_weights;
use crate::math::cholesky_with_jitter;

/// Largest joint field (observations + queries) factorised densely.
pub const MAX_JOINT_POINTS: usize = 5000;

/// Per-query conditioning data.
#[derive(Debug, Clone)]
struct Conditioning {
    /// Observation indices and their simple-kriging weights.
    neighbors: Vec<(usize, f64)>,
    /// Row of the joint field holding the query's unconditional value.
    field_index: usize,
}

/// Draw `count` conditional realisations at `queries`.
///
/// Realisation `r` is seeded with `seed + r` (wrapping), where `seed` comes
/// from `config.seed` or fresh entropy, so a fixed seed reproduces every
/// realisation regardless of thread scheduling.
pub fn simulate(
    observations: &[Observation],
    model: &VariogramModel,
    queries: &[Location],
    count: usize,
    config: &SimulationConfig,
) -> Result<Vec<Vec<f64>>, KrigeError> {
    if observations.is_empty() {
        return Err(KrigeError::Data("no observations to condition on".into()));
    }
    validate(&config.kriging)?;
    if let Some(q) = queries.iter().find(|q| !q.is_finite()) {
        return Err(KrigeError::Data(format!(
            "non-finite query location ({}, {})",
            q.x, q.y
        )));
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let mean = match config.mean {
        Some(m) if m.is_finite() => m,
        Some(m) => {
            return Err(KrigeError::InvalidConfig(format!(
                "simulation mean must be finite, got {m}"
            )));
        }
        None => observations.iter().map(|o| o.value).sum::<f64>() / observations.len() as f64,
    };

    let tol = config.kriging.duplicate_tolerance;
    let n_obs = observations.len();

    // Queries coinciding with an observation reuse its row of the joint field.
    let mut field_locations: Vec<Location> = observations.iter().map(|o| o.location).collect();
    let mut plans = Vec::with_capacity(queries.len());
    for &q in queries {
        let nb = neighborhood(observations, q, &[q], &config.kriging)?;
        let locations = nb.locations(observations);
        let weights = simple_weights(model, &locations, q, tol, config.kriging.ridge)?;

        let coincident = nb
            .indices
            .iter()
            .copied()
            .find(|&i| observations[i].location.distance(&q) <= tol);
        let field_index = match coincident {
            Some(i) => i,
            None => {
                field_locations.push(q);
                field_locations.len() - 1
            }
        };

        plans.push(Conditioning {
            neighbors: nb.indices.into_iter().zip(weights).collect(),
            field_index,
        });
    }

    let n_field = field_locations.len();
    if n_field > MAX_JOINT_POINTS {
        return Err(KrigeError::InvalidConfig(format!(
            "joint field of {n_field} points exceeds {MAX_JOINT_POINTS}; simulate fewer queries"
        )));
    }

    let mut cov = DMatrix::<f64>::zeros(n_field, n_field);
    for i in 0..n_field {
        cov[(i, i)] = model.sill();
        for j in (i + 1)..n_field {
            let c = model.covariance(field_locations[i].distance(&field_locations[j]), tol);
            cov[(i, j)] = c;
            cov[(j, i)] = c;
        }
    }
    let Some((chol, jitter)) = cholesky_with_jitter(&cov) else {
        return Err(KrigeError::SingularSystem(format!(
            "simulation covariance over {n_field} points is not positive definite"
        )));
    };
    if jitter > 0.0 {
        warn!(jitter, n = n_field, "simulation covariance needed diagonal jitter");
    }

    let base_seed = config.seed.unwrap_or_else(rand::random);
    info!(
        realisations = count,
        queries = queries.len(),
        observations = n_obs,
        seed = base_seed,
        "simulating"
    );

    let realisations = (0..count)
        .into_par_iter()
        .map(|r| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(r as u64));
            let noise = DVector::from_iterator(
                n_field,
                (0..n_field).map(|_| rng.sample::<f64, _>(StandardNormal)),
            );
            let field = &chol * noise;

            plans
                .iter()
                .map(|plan| {
                    let mut value = mean + field[plan.field_index];
                    for &(i, w) in &plan.neighbors {
                        value += w * (observations[i].value - mean - field[i]);
                    }
                    value
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    Ok(realisations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KrigingConfig, ModelFamily};

    fn obs() -> Vec<Observation> {
        vec![
            Observation::new(0.0, 0.0, 3.0),
            Observation::new(10.0, 0.0, 5.0),
            Observation::new(0.0, 10.0, 4.0),
            Observation::new(10.0, 10.0, 6.0),
            Observation::new(5.0, 5.0, 4.5),
        ]
    }

    fn model() -> VariogramModel {
        VariogramModel::new(ModelFamily::Exponential, 0.0, 2.0, 8.0).unwrap()
    }

    fn seeded(seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn fixed_seed_reproduces_realisations() {
        let q = [Location::new(2.0, 3.0), Location::new(7.0, 8.0)];
        let a = simulate(&obs(), &model(), &q, 6, &seeded(42)).unwrap();
        let b = simulate(&obs(), &model(), &q, 6, &seeded(42)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
        assert!(a.iter().all(|r| r.len() == 2));

        let c = simulate(&obs(), &model(), &q, 6, &seeded(43)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn realisations_honour_observations() {
        let data = obs();
        let q: Vec<Location> = data.iter().map(|o| o.location).collect();
        let sims = simulate(&data, &model(), &q, 20, &seeded(7)).unwrap();
        for real in sims {
            for (v, o) in real.iter().zip(&data) {
                assert!((v - o.value).abs() < 1e-8, "{v} vs {}", o.value);
            }
        }
    }

    #[test]
    fn far_queries_spread_like_the_sill() {
        let q = [Location::new(500.0, 500.0)];
        let sims = simulate(&obs(), &model(), &q, 400, &seeded(1)).unwrap();
        let vals: Vec<f64> = sims.iter().map(|r| r[0]).collect();
        let mean = vals.iter().sum::<f64>() / vals.len() as f64;
        let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (vals.len() - 1) as f64;
        assert!((mean - 4.5).abs() < 0.5, "mean {mean}");
        assert!(var > 1.0 && var < 3.0, "variance {var}");
    }

    #[test]
    fn neighbor_limit_is_respected() {
        let q = [Location::new(1.0, 1.0)];
        let cfg = SimulationConfig {
            kriging: KrigingConfig {
                neighbor_limit: Some(2),
                ..Default::default()
            },
            seed: Some(9),
            mean: Some(4.0),
        };
        let sims = simulate(&obs(), &model(), &q, 3, &cfg).unwrap();
        assert!(sims.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_realisations_is_empty() {
        assert!(simulate(&obs(), &model(), &[Location::new(1.0, 1.0)], 0, &seeded(0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn conflicting_duplicate_at_query_fails() {
        let mut data = obs();
        data.push(Observation::new(0.0, 0.0, 9.0));
        let err = simulate(&data, &model(), &[Location::new(0.0, 0.0)], 2, &seeded(0)).unwrap_err();
        assert!(matches!(err, KrigeError::DuplicateLocation { .. }));
    }
}
