//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the estimation pipeline
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{
    Command, FitArgs, GridArgs, InputArgs, KrigingArgs, ModelArgs, PredictCmd, SimulateCmd,
    VariogramArgs, VariogramCmd,
};
use crate::domain::{
    DatasetConfig, DirectionBands, GridSpec, KrigingConfig, LagSpec, ModelSource, RunConfig,
    VariogramConfig, Window,
};
use crate::error::KrigeError;

pub mod pipeline;

use pipeline::{ModelStage, SimulationRequest};

/// Entry point for the `krige` binary.
pub fn run() -> Result<(), KrigeError> {
    // KRIGE_SEED and RUST_LOG may live in a local .env file.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Variogram(cmd) => handle_variogram(cmd),
        Command::Predict(cmd) => handle_predict(cmd),
        Command::Simulate(cmd) => handle_simulate(cmd),
    }
}

/// Log to stderr so stdout stays clean for reports.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed (tests, embedding).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn handle_variogram(cmd: VariogramCmd) -> Result<(), KrigeError> {
    let mut config = base_config(&cmd.input, &cmd.variogram, &cmd.fit)?;
    config.plot = !cmd.plot.no_plot;
    config.plot_width = cmd.plot.width;
    config.plot_height = cmd.plot.height;
    config.export_model = cmd.export_model.clone();

    let (ingest, stage) = pipeline::run_variogram(&config)?;

    println!(
        "{}",
        crate::report::format_dataset_summary(ingest.dataset.stats(), ingest.rows_read)
    );
    println!("{}", crate::report::format_variogram_table(&stage.bins));
    if let Some(directional) = &stage.directional {
        println!("{}", crate::report::format_variogram_table(directional));
    }
    println!("{}", crate::report::format_fit_summary(&stage.selection));

    let best = &stage.selection.best;
    if config.plot {
        let plot = crate::plot::render_variogram_plot(
            &stage.bins,
            Some(&best.model),
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    if let Some(path) = &config.export_model {
        let file = crate::io::model_file(&best.model, Some(best.weighted_sse), &stage.bins);
        crate::io::write_model_json(path, &file)?;
        info!(path = %path.display(), "model written");
    }

    Ok(())
}

fn handle_predict(cmd: PredictCmd) -> Result<(), KrigeError> {
    let mut config = base_config(&cmd.input, &cmd.variogram, &cmd.fit)?;
    config.model_source = model_source(&cmd.model);
    config.kriging = kriging_config(&cmd.kriging, &config.dataset);
    config.grid = grid_spec(&cmd.grid)?;
    config.block_discretization = cmd.block;
    config.plot = !cmd.plot.no_plot;
    config.plot_width = cmd.plot.width;
    config.plot_height = cmd.plot.height;
    config.export_predictions = cmd.export.clone();
    config.export_model = cmd.export_model.clone();

    let run = pipeline::run_predict(&config)?;

    println!(
        "{}",
        crate::report::format_dataset_summary(run.ingest.dataset.stats(), run.ingest.rows_read)
    );
    print_model_stage(&run.model, &config);

    let summary = crate::report::summarize_predictions(&run.results);
    println!("{}", crate::report::format_prediction_summary(&summary));

    if let Some(path) = &config.export_predictions {
        crate::io::write_predictions_csv(path, &run.results)?;
        info!(path = %path.display(), rows = run.results.len(), "predictions written");
    }
    if let Some(path) = &config.export_model {
        export_model_stage(path, &run.model)?;
    }

    Ok(())
}

fn handle_simulate(cmd: SimulateCmd) -> Result<(), KrigeError> {
    let mut config = base_config(&cmd.input, &cmd.variogram, &cmd.fit)?;
    config.model_source = model_source(&cmd.model);
    config.kriging = kriging_config(&cmd.kriging, &config.dataset);
    config.grid = grid_spec(&cmd.grid)?;
    config.plot = false;
    config.export_predictions = cmd.export.clone();

    let request = SimulationRequest {
        count: cmd.realisations,
        seed: cmd.seed,
        mean: cmd.mean,
    };
    let run = pipeline::run_simulate(&config, &request)?;

    println!(
        "{}",
        crate::report::format_dataset_summary(run.ingest.dataset.stats(), run.ingest.rows_read)
    );
    print_model_stage(&run.model, &config);
    println!(
        "{}",
        crate::report::format_simulation_summary(&run.realisations, run.queries.len())
    );

    if let Some(path) = &config.export_predictions {
        crate::io::write_simulations_csv(path, &run.queries, &run.realisations)?;
        info!(path = %path.display(), realisations = run.realisations.len(), "realisations written");
    }

    Ok(())
}

fn print_model_stage(stage: &ModelStage, config: &RunConfig) {
    match stage {
        ModelStage::Fitted(fitted) => {
            println!("{}", crate::report::format_variogram_table(&fitted.bins));
            println!("{}", crate::report::format_fit_summary(&fitted.selection));
        }
        ModelStage::Loaded { path, model, .. } => {
            let title = format!("Model from {}", path.display());
            println!("{}", crate::report::format_model(model, &title));
        }
        ModelStage::Absent => {
            println!("No variogram model: inverse distance weighting, no variances.\n");
        }
    }

    if config.plot && !stage.bins().is_empty() {
        let plot = crate::plot::render_variogram_plot(
            stage.bins(),
            stage.model(),
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }
}

fn export_model_stage(path: &std::path::Path, stage: &ModelStage) -> Result<(), KrigeError> {
    let file = match stage {
        ModelStage::Fitted(fitted) => {
            let best = &fitted.selection.best;
            crate::io::model_file(&best.model, Some(best.weighted_sse), &fitted.bins)
        }
        ModelStage::Loaded { model, bins, .. } => crate::io::model_file(model, None, bins),
        ModelStage::Absent => {
            return Err(KrigeError::InvalidConfig(
                "--export-model needs a variogram model (drop --no-model)".into(),
            ));
        }
    };
    crate::io::write_model_json(path, &file)?;
    info!(path = %path.display(), "model written");
    Ok(())
}

/// Settings shared by every subcommand; the rest keep their defaults.
pub fn base_config(
    input: &InputArgs,
    variogram: &VariogramArgs,
    fit: &FitArgs,
) -> Result<RunConfig, KrigeError> {
    let dataset = DatasetConfig {
        allow_duplicate_locations: input.allow_duplicates,
        duplicate_tolerance: input.duplicate_tolerance,
    };
    Ok(RunConfig {
        csv_path: input.csv.clone(),
        x_column: input.x_column.clone(),
        y_column: input.y_column.clone(),
        value_column: input.value_column.clone(),
        value_scale: input.value_scale,
        dataset,
        variogram: variogram_config(variogram)?,
        family: fit.family,
        model_source: ModelSource::Fit,
        max_iterations: fit.max_iterations,
        range_bound_factor: (!fit.no_range_bound).then_some(fit.range_bound),
        fit_starts: fit.starts,
        kriging: KrigingConfig {
            duplicate_tolerance: dataset.duplicate_tolerance,
            ..KrigingConfig::default()
        },
        grid: GridSpec::default(),
        block_discretization: None,
        plot: false,
        plot_width: 72,
        plot_height: 20,
        export_predictions: None,
        export_model: None,
    })
}

pub fn variogram_config(args: &VariogramArgs) -> Result<VariogramConfig, KrigeError> {
    let lags = match args.lag_width {
        Some(w) => LagSpec::Width(w),
        None => LagSpec::Count(args.lags),
    };
    if let LagSpec::Width(w) = lags {
        if !(w.is_finite() && w > 0.0) {
            return Err(KrigeError::InvalidConfig(format!(
                "lag width must be finite and > 0, got {w}"
            )));
        }
    }
    let directions = (!args.directions.is_empty()).then(|| DirectionBands {
        centers_deg: args.directions.clone(),
        tolerance_deg: args.direction_tolerance,
    });
    Ok(VariogramConfig {
        max_lag: args.max_lag,
        lags,
        directions,
    })
}

pub fn model_source(args: &ModelArgs) -> ModelSource {
    match (&args.model, args.no_model) {
        (_, true) => ModelSource::None,
        (Some(path), false) => ModelSource::File(path.clone()),
        (None, false) => ModelSource::Fit,
    }
}

pub fn kriging_config(args: &KrigingArgs, dataset: &DatasetConfig) -> KrigingConfig {
    KrigingConfig {
        neighbor_limit: args.neighbors,
        max_radius: args.max_radius,
        ridge: args.ridge,
        idw_power: args.idw_power,
        duplicate_tolerance: dataset.duplicate_tolerance,
    }
}

pub fn grid_spec(args: &GridArgs) -> Result<GridSpec, KrigeError> {
    let window = match args.extent.as_deref() {
        None => Window::BoundingBox {
            padding: args.padding,
        },
        Some(&[x_min, x_max, y_min, y_max]) => Window::Extent {
            x_min,
            x_max,
            y_min,
            y_max,
        },
        Some(other) => {
            return Err(KrigeError::InvalidConfig(format!(
                "--extent takes 4 values (x_min,x_max,y_min,y_max), got {}",
                other.len()
            )));
        }
    };
    Ok(GridSpec {
        window,
        nx: args.nx,
        ny: args.ny,
    })
}
