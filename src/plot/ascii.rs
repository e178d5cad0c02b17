//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks of a variogram fit in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - empirical bins: `o`
//! - fitted model: `-` line

use crate::domain::{VariogramBin, VariogramModel};

/// Render empirical bins with an optional model curve.
///
/// The lag axis spans `[0, max lag]` (the model range when there are no bins);
/// the semivariance axis always includes zero.
pub fn render_variogram_plot(
    bins: &[VariogramBin],
    model: Option<&VariogramModel>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(f64, f64)> = bins
        .iter()
        .map(|b| (b.lag_distance, b.semivariance))
        .collect();
    let h_max = lag_extent(bins, model).unwrap_or(1.0);
    let curve = model.map(|m| sample_curve(m, h_max, width));

    render_plot(&points, curve.as_deref(), h_max, width, height)
}

fn render_plot(
    points: &[(f64, f64)],
    curve_points: Option<&[(f64, f64)]>,
    h_max: f64,
    width: usize,
    height: usize,
) -> String {
    let (y_min, y_max) = y_range(points, curve_points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so bins overlay it.
    if let Some(curve) = curve_points {
        draw_curve(&mut grid, curve, h_max, y_min, y_max);
    }

    for &(h, g) in points {
        let x = map_x(h, h_max, width);
        let y = map_y(g, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Variogram: lag=[0, {h_max:.1}] | semivariance=[{y_min:.3}, {y_max:.3}]\n"
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    out
}

fn lag_extent(bins: &[VariogramBin], model: Option<&VariogramModel>) -> Option<f64> {
    let max_bin = bins
        .iter()
        .map(|b| b.lag_distance)
        .filter(|h| h.is_finite())
        .fold(0.0_f64, f64::max);
    let h = if max_bin > 0.0 {
        max_bin
    } else {
        model.map(|m| m.range).unwrap_or(0.0)
    };
    (h.is_finite() && h > 0.0).then_some(h)
}

fn sample_curve(model: &VariogramModel, h_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let h = h_max * i as f64 / (n as f64 - 1.0);
            (h, model.gamma(h))
        })
        .collect()
}

/// Semivariance range over bins and curve, always including zero.
fn y_range(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_y = 0.0_f64;
    let mut max_y = 0.0_f64;
    let curve = curve.unwrap_or(&[]);
    for &(_, y) in points.iter().chain(curve) {
        if y.is_finite() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    (max_y > min_y).then_some((min_y, max_y))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(h: f64, h_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = (h / h_max).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Largest semivariance on row 0.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], h_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(h, y) in curve {
        let x = map_x(h, h_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
