//! Matrix exponential by scaling and squaring.

use ndarray::Array2;
use reach_core::{ReachError, Result};

/// Norm the scaled matrix is brought under before the series is summed.
const SCALED_NORM: f64 = 0.5;

/// Series terms after scaling; the tail is below `f64` precision.
const SERIES_TERMS: usize = 20;

/// Scaling beyond this many squarings overflows for any finite result.
const MAX_SQUARINGS: i32 = 1100;

fn norm_inf(m: &Array2<f64>) -> f64 {
    m.rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// `exp(M)` for a square matrix.
///
/// A non-finite input or result is reported as
/// [`ReachError::NumericDegeneracy`] carrying the input's infinity norm.
pub fn expm(m: &Array2<f64>) -> Result<Array2<f64>> {
    if m.nrows() != m.ncols() {
        return Err(ReachError::Configuration(format!(
            "matrix exponential of a non-square {}x{} matrix",
            m.nrows(),
            m.ncols()
        )));
    }
    let n = m.nrows();
    let norm = norm_inf(m);
    if !norm.is_finite() {
        return Err(ReachError::degenerate("matrix exponential input", norm));
    }

    let squarings = if norm > SCALED_NORM {
        ((norm / SCALED_NORM).log2().ceil() as i32).min(MAX_SQUARINGS)
    } else {
        0
    };
    let scale = 2f64.powi(squarings);
    if !scale.is_finite() {
        return Err(ReachError::degenerate("matrix exponential scaling", norm));
    }
    let scaled = m / scale;

    let mut result = Array2::eye(n);
    let mut term = Array2::eye(n);
    for k in 1..=SERIES_TERMS {
        term = term.dot(&scaled) / k as f64;
        result += &term;
    }
    for _ in 0..squarings {
        result = result.dot(&result);
        if result.iter().any(|v| !v.is_finite()) {
            return Err(ReachError::degenerate("matrix exponential", norm));
        }
    }
    if result.iter().any(|v| !v.is_finite()) {
        return Err(ReachError::degenerate("matrix exponential", norm));
    }
    Ok(result)
}
