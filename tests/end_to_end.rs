//! Whole-pipeline checks: load -> bin -> fit -> krige, through the public API.

use std::path::PathBuf;

use geokrige::app::pipeline::{self, ModelStage, SimulationRequest};
use geokrige::dataset::SpatialDataset;
use geokrige::domain::{
    DatasetConfig, FamilySpec, GridSpec, KrigingConfig, Location, ModelFamily, ModelSource,
    Observation, PredictionMethod, RunConfig, VariogramBin, VariogramConfig, VariogramModel,
    Window,
};
use geokrige::error::KrigeError;
use geokrige::fit::{FitOptions, fit_and_select, fit_model, initial_guess};
use geokrige::krige::predict_point;
use geokrige::variogram::compute;
use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand_distr::StandardNormal;

/// 47 stations over a 200 km square carrying a smooth east-west gradient.
fn gradient_stations() -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(2024);
    (0..47)
        .map(|_| {
            let x: f64 = rng.gen_range(0.0..200_000.0);
            let y: f64 = rng.gen_range(0.0..200_000.0);
            Observation::new(x, y, 50.0 + 0.01 * x)
        })
        .collect()
}

fn write_csv(name: &str, rows: &[Observation]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("geokrige-{}-{name}.csv", std::process::id()));
    let mut body = String::from("x,y,value\n");
    for o in rows {
        body.push_str(&format!("{},{},{}\n", o.location.x, o.location.y, o.value));
    }
    std::fs::write(&path, body).unwrap();
    path
}

fn run_config(csv: PathBuf) -> RunConfig {
    RunConfig {
        csv_path: csv,
        x_column: "x".into(),
        y_column: "y".into(),
        value_column: "value".into(),
        value_scale: 1.0,
        dataset: DatasetConfig::default(),
        variogram: VariogramConfig::default(),
        family: FamilySpec::Auto,
        model_source: ModelSource::Fit,
        max_iterations: 500,
        range_bound_factor: Some(1.0),
        fit_starts: 4,
        kriging: KrigingConfig {
            neighbor_limit: Some(16),
            ..Default::default()
        },
        grid: GridSpec {
            window: Window::BoundingBox { padding: 0.0 },
            nx: 8,
            ny: 6,
        },
        block_discretization: None,
        plot: false,
        plot_width: 72,
        plot_height: 20,
        export_predictions: None,
        export_model: None,
    }
}

#[test]
fn gradient_field_is_recovered_at_the_centre() {
    let dataset = SpatialDataset::load(gradient_stations(), &DatasetConfig::default()).unwrap();
    let bins = compute(dataset.observations(), &VariogramConfig::default()).unwrap();
    let selection =
        fit_and_select(&bins, &[ModelFamily::Gaussian], &FitOptions::default()).unwrap();
    let model = selection.best.model;
    assert_eq!(model.family, ModelFamily::Gaussian);
    assert!(model.nugget <= 0.05 * model.sill(), "{model:?}");

    let config = KrigingConfig::default();
    let centre = Location::new(100_000.0, 100_000.0);
    let r = predict_point(dataset.observations(), Some(&model), centre, &config).unwrap();
    let truth = 50.0 + 0.01 * centre.x;
    assert!((r.value - truth).abs() <= 0.01 * truth, "{} vs {truth}", r.value);
    let variance = r.variance.unwrap();
    assert!(variance >= 0.0 && variance < model.sill());
    assert_eq!(r.method, PredictionMethod::OrdinaryKriging);
}

/// Bins averaged over `realisations` draws of a zero-mean Gaussian field with
/// variogram `truth`, all observed at the same `n` random locations.
fn pooled_bins(truth: &VariogramModel, n: usize, realisations: usize, seed: u64) -> Vec<VariogramBin> {
    let mut rng = StdRng::seed_from_u64(seed);
    let locations: Vec<Location> = (0..n)
        .map(|_| {
            let x: f64 = rng.gen_range(0.0..100.0);
            let y: f64 = rng.gen_range(0.0..100.0);
            Location::new(x, y)
        })
        .collect();
    let cov = DMatrix::from_fn(n, n, |i, j| {
        truth.covariance(locations[i].distance(&locations[j]), 0.0)
    });
    let chol = cov.cholesky().unwrap().l();

    let mut pooled: Vec<VariogramBin> = Vec::new();
    for _ in 0..realisations {
        let noise = DVector::from_iterator(n, (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)));
        let field = &chol * noise;
        let obs: Vec<Observation> = locations
            .iter()
            .zip(field.iter())
            .map(|(l, &z)| Observation::new(l.x, l.y, z))
            .collect();
        let bins = compute(&obs, &VariogramConfig::default()).unwrap();
        if pooled.is_empty() {
            pooled = bins;
        } else {
            assert_eq!(pooled.len(), bins.len());
            for (p, b) in pooled.iter_mut().zip(&bins) {
                assert_eq!(p.pair_count, b.pair_count);
                p.semivariance += b.semivariance;
            }
        }
    }
    for p in &mut pooled {
        p.semivariance /= realisations as f64;
    }
    pooled
}

#[test]
fn fitted_parameters_recover_the_generating_model() {
    let truth = VariogramModel::new(ModelFamily::Spherical, 1.0, 4.0, 30.0).unwrap();
    for seed in [31, 32] {
        let bins = pooled_bins(&truth, 100, 100, seed);
        let start = initial_guess(&bins, ModelFamily::Spherical).unwrap();
        let fit = fit_model(&bins, &start, &FitOptions::default()).unwrap();
        let m = fit.model;
        for (got, want) in [(m.nugget, 1.0), (m.partial_sill, 4.0), (m.range, 30.0)] {
            assert!((got - want).abs() <= 0.2 * want, "seed {seed}: {m:?}");
        }
    }
}

#[test]
fn two_stations_cannot_be_fitted() {
    let obs = vec![Observation::new(0.0, 0.0, 1.0), Observation::new(1000.0, 0.0, 2.0)];
    let dataset = SpatialDataset::load(obs, &DatasetConfig::default()).unwrap();
    let bins = compute(dataset.observations(), &VariogramConfig::default()).unwrap();
    let err = fit_and_select(&bins, &ModelFamily::ALL, &FitOptions::default()).unwrap_err();
    assert!(matches!(err, KrigeError::FitConvergence(_)));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn duplicates_are_rejected_at_load_and_at_the_query() {
    let mut obs = gradient_stations();
    let shared = obs[3].location;
    obs.push(Observation::new(shared.x, shared.y, obs[3].value + 7.0));

    let err = SpatialDataset::load(obs.clone(), &DatasetConfig::default()).unwrap_err();
    assert!(matches!(err, KrigeError::Data(_)));

    let lenient = DatasetConfig {
        allow_duplicate_locations: true,
        ..Default::default()
    };
    let dataset = SpatialDataset::load(obs, &lenient).unwrap();
    let err = predict_point(dataset.observations(), None, shared, &KrigingConfig::default())
        .unwrap_err();
    assert!(matches!(err, KrigeError::DuplicateLocation { count: 2, .. }));
}

#[test]
fn predict_pipeline_covers_the_grid() {
    let csv = write_csv("predict", &gradient_stations());
    let config = run_config(csv.clone());
    let run = pipeline::run_predict(&config).unwrap();
    std::fs::remove_file(csv).ok();

    assert_eq!(run.ingest.rows_read, 47);
    assert!(matches!(run.model, ModelStage::Fitted(_)));
    assert_eq!(run.results.len(), 48);
    for r in &run.results {
        let p = r.as_ref().unwrap();
        assert!(p.value.is_finite());
        assert!(p.variance.unwrap() >= 0.0);
    }
}

#[test]
fn idw_pipeline_has_no_variances() {
    let csv = write_csv("idw", &gradient_stations());
    let mut config = run_config(csv.clone());
    config.model_source = ModelSource::None;
    config.block_discretization = Some(2);
    let run = pipeline::run_predict(&config).unwrap();
    std::fs::remove_file(csv).ok();

    assert!(matches!(run.model, ModelStage::Absent));
    for r in &run.results {
        let p = r.as_ref().unwrap();
        assert_eq!(p.method, PredictionMethod::InverseDistance);
        assert!(p.variance.is_none());
        assert!((50.0..=2050.0).contains(&p.value));
    }
}

#[test]
fn seeded_simulation_is_reproducible() {
    let csv = write_csv("simulate", &gradient_stations());
    let mut config = run_config(csv.clone());
    config.family = FamilySpec::Gaussian;
    config.grid.nx = 4;
    config.grid.ny = 3;
    let request = SimulationRequest {
        count: 3,
        seed: Some(11),
        mean: None,
    };
    let a = pipeline::run_simulate(&config, &request).unwrap();
    let b = pipeline::run_simulate(&config, &request).unwrap();
    std::fs::remove_file(csv).ok();

    assert_eq!(a.queries.len(), 12);
    assert_eq!(a.realisations.len(), 3);
    assert_eq!(a.realisations, b.realisations);
}

#[test]
fn simulation_without_a_model_is_refused() {
    let csv = write_csv("simulate-idw", &gradient_stations());
    let mut config = run_config(csv.clone());
    config.model_source = ModelSource::None;
    let request = SimulationRequest {
        count: 1,
        seed: Some(1),
        mean: None,
    };
    let err = pipeline::run_simulate(&config, &request).unwrap_err();
    std::fs::remove_file(csv).ok();
    assert!(matches!(err, KrigeError::InvalidConfig(_)));
}
