//! Shared estimation pipeline used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> empirical variogram -> model fit/selection -> kriging
//!
//! The subcommand handlers can then focus on presentation and exports.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::dataset::SpatialDataset;
use crate::domain::{
    Location, ModelSource, PredictionResult, RunConfig, SimulationConfig,
    VariogramBin, VariogramConfig, VariogramModel,
};
use crate::error::KrigeError;
use crate::fit::{FitOptions, FitSelection, fit_and_select};
use crate::io::{CsvColumns, IngestedData, load_dataset, read_model_json};
use crate::krige::{predict_blocks, predict_points, simulate};
use crate::query::Grid;
use crate::variogram::compute;

/// Empirical variogram plus the fit that was selected from it.
#[derive(Debug, Clone)]
pub struct VariogramStage {
    /// Omnidirectional bins (the ones that are fitted).
    pub bins: Vec<VariogramBin>,
    /// Direction-banded bins, when bands are configured.
    pub directional: Option<Vec<VariogramBin>>,
    pub selection: FitSelection,
}

/// The model used by the kriging stage and where it came from.
#[derive(Debug, Clone)]
pub enum ModelStage {
    Fitted(VariogramStage),
    Loaded { path: PathBuf, model: VariogramModel, bins: Vec<VariogramBin> },
    /// Inverse distance fallback.
    Absent,
}

impl ModelStage {
    pub fn model(&self) -> Option<&VariogramModel> {
        match self {
            ModelStage::Fitted(stage) => Some(&stage.selection.best.model),
            ModelStage::Loaded { model, .. } => Some(model),
            ModelStage::Absent => None,
        }
    }

    pub fn bins(&self) -> &[VariogramBin] {
        match self {
            ModelStage::Fitted(stage) => &stage.bins,
            ModelStage::Loaded { bins, .. } => bins,
            ModelStage::Absent => &[],
        }
    }
}

/// All computed outputs of a `krige predict` run.
#[derive(Debug, Clone)]
pub struct PredictRun {
    pub ingest: IngestedData,
    pub model: ModelStage,
    pub grid: Grid,
    pub results: Vec<Result<PredictionResult, KrigeError>>,
}

/// All computed outputs of a `krige simulate` run.
#[derive(Debug, Clone)]
pub struct SimulateRun {
    pub ingest: IngestedData,
    pub model: ModelStage,
    pub queries: Vec<Location>,
    pub realisations: Vec<Vec<f64>>,
}

/// Simulation-only knobs on top of [`RunConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationRequest {
    pub count: usize,
    pub seed: Option<u64>,
    pub mean: Option<f64>,
}

pub fn ingest(config: &RunConfig) -> Result<IngestedData, KrigeError> {
    let columns = CsvColumns {
        x: config.x_column.clone(),
        y: config.y_column.clone(),
        value: config.value_column.clone(),
    };
    load_dataset(&config.csv_path, &columns, config.value_scale, &config.dataset)
}

pub fn fit_options(config: &RunConfig) -> FitOptions {
    FitOptions {
        max_iterations: config.max_iterations,
        range_bound_factor: config.range_bound_factor,
        starts: config.fit_starts,
        ..FitOptions::default()
    }
}

/// Bin the dataset and fit the requested families.
pub fn fit_dataset(dataset: &SpatialDataset, config: &RunConfig) -> Result<VariogramStage, KrigeError> {
    let omni_config = VariogramConfig {
        directions: None,
        ..config.variogram.clone()
    };
    let bins = compute(dataset.observations(), &omni_config)?;
    let directional = match &config.variogram.directions {
        Some(_) => Some(compute(dataset.observations(), &config.variogram)?),
        None => None,
    };
    info!(bins = bins.len(), "empirical variogram computed");

    let selection = fit_and_select(&bins, &config.family.families(), &fit_options(config))?;

    Ok(VariogramStage {
        bins,
        directional,
        selection,
    })
}

/// Resolve the model according to `config.model_source`.
pub fn resolve_model(dataset: &SpatialDataset, config: &RunConfig) -> Result<ModelStage, KrigeError> {
    match &config.model_source {
        ModelSource::Fit => Ok(ModelStage::Fitted(fit_dataset(dataset, config)?)),
        ModelSource::File(path) => {
            let file = read_model_json(path)?;
            info!(path = %path.display(), family = file.model.family.display_name(), "loaded model");
            Ok(ModelStage::Loaded {
                path: path.clone(),
                model: file.model,
                bins: file.bins,
            })
        }
        ModelSource::None => {
            warn!("no variogram model: falling back to inverse distance weighting");
            Ok(ModelStage::Absent)
        }
    }
}

pub fn run_variogram(config: &RunConfig) -> Result<(IngestedData, VariogramStage), KrigeError> {
    let ingest = ingest(config)?;
    let stage = fit_dataset(&ingest.dataset, config)?;
    Ok((ingest, stage))
}

/// Predict every grid cell (centres, or `k × k` blocks).
pub fn predict_grid(
    dataset: &SpatialDataset,
    model: Option<&VariogramModel>,
    config: &RunConfig,
) -> Result<(Grid, Vec<Result<PredictionResult, KrigeError>>), KrigeError> {
    let grid = Grid::new(&config.grid, dataset.stats())?;
    let results = match config.block_discretization {
        Some(k) => {
            let regions = grid.cell_regions(k)?;
            predict_blocks(dataset.observations(), model, &regions, &config.kriging)
        }
        None => predict_points(dataset.observations(), model, &grid.cell_centres(), &config.kriging),
    };

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        warn!(failed, total = results.len(), "some targets could not be predicted");
    }
    Ok((grid, results))
}

pub fn run_predict(config: &RunConfig) -> Result<PredictRun, KrigeError> {
    let ingest = ingest(config)?;
    let model = resolve_model(&ingest.dataset, config)?;
    let (grid, results) = predict_grid(&ingest.dataset, model.model(), config)?;
    Ok(PredictRun {
        ingest,
        model,
        grid,
        results,
    })
}

pub fn run_simulate(config: &RunConfig, request: &SimulationRequest) -> Result<SimulateRun, KrigeError> {
    let ingest = ingest(config)?;
    let model = resolve_model(&ingest.dataset, config)?;
    let Some(variogram) = model.model() else {
        return Err(KrigeError::InvalidConfig(
            "simulation needs a variogram model (drop --no-model)".into(),
        ));
    };

    let grid = Grid::new(&config.grid, ingest.dataset.stats())?;
    let queries = grid.cell_centres();
    let sim_config = SimulationConfig {
        kriging: config.kriging,
        seed: request.seed,
        mean: request.mean,
    };
    let realisations = simulate(
        ingest.dataset.observations(),
        variogram,
        &queries,
        request.count,
        &sim_config,
    )?;

    Ok(SimulateRun {
        ingest,
        model,
        queries,
        realisations,
    })
}
