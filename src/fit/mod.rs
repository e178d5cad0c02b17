//! Variogram model fitting.
//!
//! Responsibilities:
//!
//! - weighted least-squares calibration of one family (projected LM)
//! - deterministic multi-start over log-spaced starting ranges (parallel)
//! - selection of the best family by weighted SSE

pub mod fitter;
pub mod range_grid;
pub mod selection;

pub use fitter::*;
pub use range_grid::*;
pub use selection::*;
