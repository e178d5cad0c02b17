//! Command-line parsing for the `krige` binary.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! estimation code. Argument groups are flattened into each subcommand so the
//! same flag means the same thing everywhere.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::FamilySpec;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "krige", version, about = "Variogram fitting and ordinary kriging for scattered point data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute the empirical variogram, fit model families and report the best.
    Variogram(VariogramCmd),
    /// Krige a regular grid (points or blocks) and print a summary.
    Predict(PredictCmd),
    /// Draw conditional realisations on a regular grid.
    Simulate(SimulateCmd),
}

#[derive(Debug, Args, Clone)]
pub struct VariogramCmd {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub variogram: VariogramArgs,
    #[command(flatten)]
    pub fit: FitArgs,
    #[command(flatten)]
    pub plot: PlotArgs,

    /// Export the chosen model (params + bins + sampled curve) to JSON.
    #[arg(long = "export-model", value_name = "JSON")]
    pub export_model: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PredictCmd {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub variogram: VariogramArgs,
    #[command(flatten)]
    pub fit: FitArgs,
    #[command(flatten)]
    pub model: ModelArgs,
    #[command(flatten)]
    pub kriging: KrigingArgs,
    #[command(flatten)]
    pub grid: GridArgs,
    #[command(flatten)]
    pub plot: PlotArgs,

    /// Block kriging: discretise every grid cell into k x k points.
    #[arg(long, value_name = "K")]
    pub block: Option<usize>,

    /// Export predictions to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the fitted model to JSON.
    #[arg(long = "export-model", value_name = "JSON")]
    pub export_model: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateCmd {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub variogram: VariogramArgs,
    #[command(flatten)]
    pub fit: FitArgs,
    #[command(flatten)]
    pub model: ModelArgs,
    #[command(flatten)]
    pub kriging: KrigingArgs,
    #[command(flatten)]
    pub grid: GridArgs,

    /// Number of realisations.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub realisations: usize,

    /// Seed for reproducible realisations (fresh entropy when unset).
    #[arg(long, env = "KRIGE_SEED")]
    pub seed: Option<u64>,

    /// Simple-kriging mean (defaults to the sample mean).
    #[arg(long, allow_negative_numbers = true)]
    pub mean: Option<f64>,

    /// Export realisations to CSV (one column per realisation).
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

/// Where the observations come from.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// CSV of projected records.
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// Column holding the easting (metres).
    #[arg(long, default_value = "x")]
    pub x_column: String,

    /// Column holding the northing (metres).
    #[arg(long, default_value = "y")]
    pub y_column: String,

    /// Column holding the observed value.
    #[arg(long, default_value = "value")]
    pub value_column: String,

    /// Multiply values at ingest (0.514444 converts knots to m/s).
    #[arg(long, default_value_t = 1.0)]
    pub value_scale: f64,

    /// Accept coincident observations instead of rejecting the file.
    #[arg(long)]
    pub allow_duplicates: bool,

    /// Distance under which two locations count as the same place.
    #[arg(long, default_value_t = crate::domain::DEFAULT_DUPLICATE_TOLERANCE)]
    pub duplicate_tolerance: f64,
}

/// Empirical variogram binning.
#[derive(Debug, Args, Clone)]
pub struct VariogramArgs {
    /// Largest lag to bin (default: a third of the largest pairwise distance).
    #[arg(long)]
    pub max_lag: Option<f64>,

    /// Number of equal-width lag bins.
    #[arg(long, default_value_t = 15, conflicts_with = "lag_width")]
    pub lags: usize,

    /// Fixed lag bin width instead of a bin count.
    #[arg(long)]
    pub lag_width: Option<f64>,

    /// Direction band centres in degrees clockwise from north (e.g. 0,45,90,135).
    #[arg(long, value_delimiter = ',')]
    pub directions: Vec<f64>,

    /// Half-width of each direction band in degrees.
    #[arg(long, default_value_t = 22.5)]
    pub direction_tolerance: f64,
}

/// Model fitting.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Which model family (or `auto` for all).
    #[arg(long, value_enum, default_value_t = FamilySpec::Auto)]
    pub family: FamilySpec,

    /// Optimiser iteration budget per start.
    #[arg(long, default_value_t = 500)]
    pub max_iterations: usize,

    /// Upper bound on the range as a multiple of the largest bin lag.
    #[arg(long, default_value_t = 1.0, conflicts_with = "no_range_bound")]
    pub range_bound: f64,

    /// Leave the range unbounded above.
    #[arg(long)]
    pub no_range_bound: bool,

    /// Log-spaced starting ranges per family.
    #[arg(long, default_value_t = 4)]
    pub starts: usize,
}

/// Reuse or skip the variogram model.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Model JSON from `krige variogram --export-model` (skips fitting).
    #[arg(long, value_name = "JSON", conflicts_with = "no_model")]
    pub model: Option<PathBuf>,

    /// Inverse distance weighting instead of kriging (no variances).
    #[arg(long)]
    pub no_model: bool,
}

/// Kriging neighbourhood.
#[derive(Debug, Args, Clone)]
pub struct KrigingArgs {
    /// Use only the N nearest observations per target.
    #[arg(long, value_name = "N")]
    pub neighbors: Option<usize>,

    /// Ignore observations farther than this from the target.
    #[arg(long)]
    pub max_radius: Option<f64>,

    /// Retry singular systems with this extra diagonal variance.
    #[arg(long)]
    pub ridge: Option<f64>,

    /// Inverse distance power for the no-model fallback.
    #[arg(long, default_value_t = 2.0)]
    pub idw_power: f64,
}

/// Prediction grid.
#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// Grid columns.
    #[arg(long, default_value_t = 50)]
    pub nx: usize,

    /// Grid rows.
    #[arg(long, default_value_t = 50)]
    pub ny: usize,

    /// Grow the observation bounding box by this many metres.
    #[arg(long, default_value_t = 0.0)]
    pub padding: f64,

    /// Explicit window instead of the bounding box.
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "X_MIN,X_MAX,Y_MIN,Y_MAX",
        allow_hyphen_values = true
    )]
    pub extent: Option<Vec<f64>>,
}

/// Terminal plot.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Disable the ASCII variogram plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}
