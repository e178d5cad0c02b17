//! Variogram model families.
//!
//! Models are implemented as small, pure functions of `(family, h, params)` so
//! that the fitter and the kriging engine can stay generic over the family.

pub mod model;

pub use model::*;
