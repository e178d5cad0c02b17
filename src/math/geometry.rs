//! Planar geometry helpers for pair enumeration and direction classes.

/// Azimuth of the separation vector `(dx, dy)` in degrees, clockwise from
/// north (+y), folded to `[0, 180)`.
///
/// A pair has no orientation, so `(dx, dy)` and `(-dx, -dy)` share an azimuth.
pub fn azimuth_deg(dx: f64, dy: f64) -> f64 {
    let deg = dx.atan2(dy).to_degrees();
    fold_180(deg)
}

/// Fold any angle in degrees into `[0, 180)`.
pub fn fold_180(deg: f64) -> f64 {
    let folded = deg.rem_euclid(180.0);
    // rem_euclid can round up to exactly 180 for tiny negative inputs.
    if folded >= 180.0 { 0.0 } else { folded }
}

/// Smallest separation between two axial directions on the 180° circle.
pub fn axial_difference_deg(a: f64, b: f64) -> f64 {
    let d = fold_180(a - b);
    d.min(180.0 - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azimuth_is_clockwise_from_north_and_axial() {
        assert!((azimuth_deg(0.0, 1.0) - 0.0).abs() < 1e-12);
        assert!((azimuth_deg(1.0, 0.0) - 90.0).abs() < 1e-12);
        assert!((azimuth_deg(1.0, 1.0) - 45.0).abs() < 1e-12);
        assert!((azimuth_deg(-1.0, 1.0) - 135.0).abs() < 1e-12);
        assert!((azimuth_deg(-1.0, -1.0) - 45.0).abs() < 1e-12);
        assert!((azimuth_deg(0.0, -1.0) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn axial_difference_wraps() {
        assert!((axial_difference_deg(170.0, 5.0) - 15.0).abs() < 1e-12);
        assert!((axial_difference_deg(90.0, 45.0) - 45.0).abs() < 1e-12);
        assert!((axial_difference_deg(0.0, 179.0) - 1.0).abs() < 1e-9);
    }
}
