//! Kriging engine: ordinary point and block kriging, the inverse-distance
//! fallback, neighbourhood search and conditional simulation.
//!
//! Observations and the model are only ever borrowed; every call returns a new
//! result and independent queries run in parallel.

pub mod idw;
pub mod neighbors;
pub mod predict;
pub mod simulate;
pub mod system;

pub use idw::*;
pub use neighbors::{neighborhood, Neighborhood, MAX_GLOBAL_NEIGHBORHOOD};
pub use predict::*;
pub use simulate::*;
pub use system::*;
