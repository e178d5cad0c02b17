//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - passed by reference between the variogram, fitting and kriging stages
//! - exported to JSON/CSV for external renderers
//! - reloaded later (a fitted model file feeds `krige predict --model`)

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KrigeError;

/// Distance under which two locations are treated as the same place (metres).
pub const DEFAULT_DUPLICATE_TOLERANCE: f64 = 1e-6;

/// A planar location in projected metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Location) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A single measured value at a planar location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub location: Location,
    pub value: f64,
}

impl Observation {
    pub const fn new(x: f64, y: f64, value: f64) -> Self {
        Self {
            location: Location::new(x, y),
            value,
        }
    }
}

/// One lag class of an empirical variogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariogramBin {
    /// Mean separation distance of the pairs in this bin.
    pub lag_distance: f64,
    pub semivariance: f64,
    pub pair_count: usize,
    /// Direction band centre in degrees (clockwise from north), if banded.
    pub direction: Option<f64>,
}

/// Parametric variogram family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    Gaussian,
    Spherical,
    Exponential,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::Spherical,
        ModelFamily::Exponential,
        ModelFamily::Gaussian,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ModelFamily::Gaussian => "Gaussian",
            ModelFamily::Spherical => "Spherical",
            ModelFamily::Exponential => "Exponential",
        }
    }
}

/// Which family (or families) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FamilySpec {
    /// Fit every family and keep the best weighted SSE.
    Auto,
    Gaussian,
    Spherical,
    Exponential,
}

impl FamilySpec {
    pub fn families(self) -> Vec<ModelFamily> {
        match self {
            FamilySpec::Auto => ModelFamily::ALL.to_vec(),
            FamilySpec::Gaussian => vec![ModelFamily::Gaussian],
            FamilySpec::Spherical => vec![ModelFamily::Spherical],
            FamilySpec::Exponential => vec![ModelFamily::Exponential],
        }
    }
}

/// Fitted (or user-supplied) variogram model parameters.
///
/// Evaluation lives in [`crate::models`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariogramModel {
    pub family: ModelFamily,
    pub nugget: f64,
    pub partial_sill: f64,
    pub range: f64,
}

impl VariogramModel {
    /// Build a model, rejecting parameters outside their domain.
    pub fn new(
        family: ModelFamily,
        nugget: f64,
        partial_sill: f64,
        range: f64,
    ) -> Result<Self, KrigeError> {
        if !(nugget.is_finite() && nugget >= 0.0) {
            return Err(KrigeError::InvalidConfig(format!(
                "nugget must be finite and >= 0, got {nugget}"
            )));
        }
        if !(partial_sill.is_finite() && partial_sill >= 0.0) {
            return Err(KrigeError::InvalidConfig(format!(
                "partial sill must be finite and >= 0, got {partial_sill}"
            )));
        }
        if !(range.is_finite() && range > 0.0) {
            return Err(KrigeError::InvalidConfig(format!(
                "range must be finite and > 0, got {range}"
            )));
        }
        Ok(Self {
            family,
            nugget,
            partial_sill,
            range,
        })
    }

    pub fn sill(&self) -> f64 {
        self.nugget + self.partial_sill
    }
}

/// How a prediction was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    OrdinaryKriging,
    /// Degraded mode used when no variogram model is available.
    InverseDistance,
}

/// What a prediction refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Target {
    Point(Location),
    Region { id: String, centroid: Location },
}

impl Target {
    pub fn location(&self) -> Location {
        match self {
            Target::Point(loc) => *loc,
            Target::Region { centroid, .. } => *centroid,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Target::Point(loc) => format!("({:.1}, {:.1})", loc.x, loc.y),
            Target::Region { id, .. } => id.clone(),
        }
    }
}

/// One kriged (or IDW) estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub target: Target,
    pub value: f64,
    /// `None` means "variance unavailable" (inverse-distance fallback).
    pub variance: Option<f64>,
    pub method: PredictionMethod,
}

/// A block-kriging target: a region represented by sample points inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRegion {
    pub id: String,
    pub points: Vec<Location>,
}

impl QueryRegion {
    pub fn new(id: impl Into<String>, points: Vec<Location>) -> Self {
        Self {
            id: id.into(),
            points,
        }
    }

    /// Mean of the sample points, `None` for an empty region.
    pub fn centroid(&self) -> Option<Location> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Location::new(sx / n, sy / n))
    }
}

/// Dataset construction options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetConfig {
    pub allow_duplicate_locations: bool,
    pub duplicate_tolerance: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            allow_duplicate_locations: false,
            duplicate_tolerance: DEFAULT_DUPLICATE_TOLERANCE,
        }
    }
}

/// How lag classes are laid out up to the maximum lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LagSpec {
    Width(f64),
    Count(usize),
}

/// Direction classes for an anisotropy check.
///
/// Angles are degrees clockwise from north (+y), folded to `[0, 180)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionBands {
    pub centers_deg: Vec<f64>,
    pub tolerance_deg: f64,
}

impl DirectionBands {
    /// The usual four-way split: 0°, 45°, 90°, 135° ± 22.5°.
    pub fn cardinal() -> Self {
        Self {
            centers_deg: vec![0.0, 45.0, 90.0, 135.0],
            tolerance_deg: 22.5,
        }
    }
}

/// Empirical variogram options.
#[derive(Debug, Clone, PartialEq)]
pub struct VariogramConfig {
    /// Maximum lag; `None` means one third of the largest pairwise distance.
    pub max_lag: Option<f64>,
    pub lags: LagSpec,
    pub directions: Option<DirectionBands>,
}

impl Default for VariogramConfig {
    fn default() -> Self {
        Self {
            max_lag: None,
            lags: LagSpec::Count(15),
            directions: None,
        }
    }
}

/// Kriging neighbourhood and fallback options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KrigingConfig {
    /// Use only the `n` nearest observations (`nmax`).
    pub neighbor_limit: Option<usize>,
    /// Ignore observations farther than this from the target.
    pub max_radius: Option<f64>,
    /// Retry a singular solve once with this value added to the diagonal.
    pub ridge: Option<f64>,
    /// Inverse-distance power used when no model is supplied.
    pub idw_power: f64,
    pub duplicate_tolerance: f64,
}

impl Default for KrigingConfig {
    fn default() -> Self {
        Self {
            neighbor_limit: None,
            max_radius: None,
            ridge: None,
            idw_power: 2.0,
            duplicate_tolerance: DEFAULT_DUPLICATE_TOLERANCE,
        }
    }
}

/// Conditional simulation options.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationConfig {
    pub kriging: KrigingConfig,
    /// Seed for reproducible realisations; fresh entropy when `None`.
    pub seed: Option<u64>,
    /// Simple-kriging mean; the sample mean when `None`.
    pub mean: Option<f64>,
}

/// Query window policy for grid generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Window {
    /// Observation bounding box grown by `padding` metres on every side.
    BoundingBox { padding: f64 },
    /// Explicit extent.
    Extent {
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    },
}

/// Regular prediction grid (cell centres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub window: Window,
    pub nx: usize,
    pub ny: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            window: Window::BoundingBox { padding: 0.0 },
            nx: 50,
            ny: 50,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub csv_path: PathBuf,
    pub x_column: String,
    pub y_column: String,
    pub value_column: String,
    /// Multiplier applied to values at ingest (e.g. knots -> m/s).
    pub value_scale: f64,

    pub dataset: DatasetConfig,
    pub variogram: VariogramConfig,
    pub family: FamilySpec,
    pub model_source: ModelSource,
    pub max_iterations: usize,
    pub range_bound_factor: Option<f64>,
    /// Starting ranges tried per family.
    pub fit_starts: usize,

    pub kriging: KrigingConfig,
    pub grid: GridSpec,
    /// Block-kriging discretisation per cell side (`None` = point kriging).
    pub block_discretization: Option<usize>,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_predictions: Option<PathBuf>,
    pub export_model: Option<PathBuf>,
}

/// Where the kriging stage gets its variogram model from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Fit the empirical variogram of the loaded data.
    Fit,
    /// Reuse a model JSON written by an earlier run.
    File(PathBuf),
    /// No model: inverse distance weighting, no variances.
    None,
}

/// Sampled model curve for quick plotting by external tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCurve {
    pub lag: Vec<f64>,
    pub semivariance: Vec<f64>,
}

/// Portable representation of a fitted variogram (`--export-model`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub model: VariogramModel,
    /// Weighted SSE of the fit; absent for hand-written models.
    #[serde(default)]
    pub weighted_sse: Option<f64>,
    #[serde(default)]
    pub bins: Vec<VariogramBin>,
    #[serde(default)]
    pub curve: Option<ModelCurve>,
}
