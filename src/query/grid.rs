//! Regular prediction grids.
//!
//! The window is explicit: either the observations' bounding box grown by a
//! padding, or a caller-supplied extent. The window is split into `nx × ny`
//! cells; point kriging uses the cell centres and block kriging discretises
//! each cell into `k × k` sub-cell centres.

use serde::Serialize;

use crate::dataset::DatasetStats;
use crate::domain::{GridSpec, Location, QueryRegion, Window};
use crate::error::KrigeError;

/// A resolved grid: window origin, cell size and shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Grid {
    pub x_min: f64,
    pub y_min: f64,
    pub dx: f64,
    pub dy: f64,
    pub nx: usize,
    pub ny: usize,
}

impl Grid {
    /// Resolve `spec` against the observation extent.
    pub fn new(spec: &GridSpec, stats: &DatasetStats) -> Result<Self, KrigeError> {
        if spec.nx == 0 || spec.ny == 0 {
            return Err(KrigeError::InvalidConfig(format!(
                "grid must have at least one cell per axis, got {}x{}",
                spec.nx, spec.ny
            )));
        }

        let (x_min, x_max, y_min, y_max) = match spec.window {
            Window::BoundingBox { padding } => {
                if !(padding.is_finite() && padding >= 0.0) {
                    return Err(KrigeError::InvalidConfig(format!(
                        "grid padding must be finite and >= 0, got {padding}"
                    )));
                }
                (
                    stats.x_min - padding,
                    stats.x_max + padding,
                    stats.y_min - padding,
                    stats.y_max + padding,
                )
            }
            Window::Extent {
                x_min,
                x_max,
                y_min,
                y_max,
            } => (x_min, x_max, y_min, y_max),
        };

        let finite = [x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite());
        if !finite || x_max <= x_min || y_max <= y_min {
            return Err(KrigeError::InvalidConfig(format!(
                "degenerate grid window x=[{x_min}, {x_max}] y=[{y_min}, {y_max}] (collinear data needs padding)"
            )));
        }

        Ok(Self {
            x_min,
            y_min,
            dx: (x_max - x_min) / spec.nx as f64,
            dy: (y_max - y_min) / spec.ny as f64,
            nx: spec.nx,
            ny: spec.ny,
        })
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell centres, row-major from the south-west corner.
    pub fn cell_centres(&self) -> Vec<Location> {
        let mut out = Vec::with_capacity(self.len());
        for row in 0..self.ny {
            for col in 0..self.nx {
                out.push(Location::new(
                    self.x_min + (col as f64 + 0.5) * self.dx,
                    self.y_min + (row as f64 + 0.5) * self.dy,
                ));
            }
        }
        out
    }

    /// One region per cell, each discretised into `k × k` sample points.
    /// Region ids are `r{row}c{col}`, in the same order as [`Grid::cell_centres`].
    pub fn cell_regions(&self, k: usize) -> Result<Vec<QueryRegion>, KrigeError> {
        if k == 0 {
            return Err(KrigeError::InvalidConfig(
                "block discretisation must be >= 1".into(),
            ));
        }
        let sx = self.dx / k as f64;
        let sy = self.dy / k as f64;

        let mut out = Vec::with_capacity(self.len());
        for row in 0..self.ny {
            for col in 0..self.nx {
                let x0 = self.x_min + col as f64 * self.dx;
                let y0 = self.y_min + row as f64 * self.dy;
                let mut points = Vec::with_capacity(k * k);
                for j in 0..k {
                    for i in 0..k {
                        points.push(Location::new(
                            x0 + (i as f64 + 0.5) * sx,
                            y0 + (j as f64 + 0.5) * sy,
                        ));
                    }
                }
                out.push(QueryRegion::new(format!("r{row}c{col}"), points));
            }
        }
        Ok(out)
    }
}
