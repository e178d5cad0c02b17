//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations and planar locations (`Observation`, `Location`)
//! - variogram bins and models (`VariogramBin`, `VariogramModel`, `ModelFamily`)
//! - kriging targets and outputs (`QueryRegion`, `PredictionResult`)
//! - typed configuration for every stage (`VariogramConfig`, `KrigingConfig`, ...)

pub mod types;

pub use types::*;
