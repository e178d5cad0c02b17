//! Mathematical utilities: planar geometry, dense solvers, least squares.

pub mod geometry;
pub mod linalg;
pub mod ols;

pub use geometry::*;
pub use linalg::*;
pub use ols::*;
