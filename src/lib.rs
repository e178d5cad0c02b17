//! `geokrige` library crate.
//!
//! The binary (`krige`) is a thin wrapper around this library so that:
//!
//! - the estimation core (variogram, fitting, kriging) is testable without
//!   spawning processes
//! - other front ends can call the same pipeline
//!
//! The core is synchronous and pure: every operation takes its inputs and
//! config explicitly and returns `Result<_, KrigeError>`.

pub mod app;
pub mod cli;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod krige;
pub mod math;
pub mod models;
pub mod plot;
pub mod query;
pub mod report;
pub mod variogram;
