//! Reporting utilities: formatted terminal output for each pipeline stage.

pub mod format;

pub use format::*;
