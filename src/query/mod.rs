//! Query generation: prediction grids and block regions.

pub mod grid;

pub use grid::*;
