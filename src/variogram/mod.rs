//! Empirical variogram estimation.

pub mod empirical;

pub use empirical::*;
