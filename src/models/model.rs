//! Semivariance evaluation for the Gaussian / Spherical / Exponential families.
//!
//! Every family is written as
//!
//! ```text
//! γ(h) = nugget + partial_sill · f(h; range)
//! ```
//!
//! with a unit shape `f` rising from 0 at `h = 0` to 1. The fitter needs two
//! primitives on top of `γ`:
//! - the shape itself (the partial-sill derivative)
//! - `∂f/∂range` (the range derivative, scaled by the partial sill)

use crate::domain::{ModelFamily, VariogramModel};

/// Unit shape `f(h; range)` in `[0, 1]`.
pub fn shape(family: ModelFamily, h: f64, range: f64) -> f64 {
    let h = h.abs();
    match family {
        ModelFamily::Gaussian => {
            let u = h / range;
            -(-u * u).exp_m1()
        }
        ModelFamily::Spherical => {
            if h >= range {
                1.0
            } else {
                let u = h / range;
                1.5 * u - 0.5 * u * u * u
            }
        }
        ModelFamily::Exponential => -(-h / range).exp_m1(),
    }
}

/// `∂f/∂range` at fixed `h`. Non-positive for every family.
pub fn shape_d_range(family: ModelFamily, h: f64, range: f64) -> f64 {
    let h = h.abs();
    match family {
        ModelFamily::Gaussian => {
            let u = h / range;
            -2.0 * u * u / range * (-u * u).exp()
        }
        ModelFamily::Spherical => {
            if h >= range {
                0.0
            } else {
                let u = h / range;
                1.5 * (u * u * u - u) / range
            }
        }
        ModelFamily::Exponential => {
            let u = h / range;
            -u / range * (-u).exp()
        }
    }
}

/// `γ(h)` for explicit parameters.
pub fn gamma(family: ModelFamily, h: f64, nugget: f64, partial_sill: f64, range: f64) -> f64 {
    nugget + partial_sill * shape(family, h, range)
}

impl VariogramModel {
    /// Model semivariance; tends to `nugget` as `h → 0`.
    pub fn gamma(&self, h: f64) -> f64 {
        gamma(self.family, h, self.nugget, self.partial_sill, self.range)
    }

    /// Semivariance between two locations `h` apart.
    ///
    /// Zero for coincident locations (`h <= tolerance`): the nugget is a jump at
    /// the origin, not part of a point's variance with itself.
    pub fn semivariance_between(&self, h: f64, tolerance: f64) -> f64 {
        if h <= tolerance { 0.0 } else { self.gamma(h) }
    }

    /// Covariance `C(h) = sill - γ(h)`, with `C(0) = sill`.
    pub fn covariance(&self, h: f64, tolerance: f64) -> f64 {
        self.sill() - self.semivariance_between(h, tolerance)
    }
}
