//! End-to-end tests: whole runs checked against simulated trajectories.


use crate::{Trajectory, Zonotope};
use ndarray::Array1;

/// Tolerance for floating-point round-off in containment checks.
const FP_TOLERANCE: f64 = 1e-8;

/// Membership through the facet form; sets that are not full-dimensional
/// fall back to their interval hull.
fn contains(z: &Zonotope, x: &Array1<f64>) -> bool {
    match z.contains_point(x, FP_TOLERANCE) {
        Ok(inside) => inside,
        Err(_) => {
            let hull = z.interval_hull();
            (0..x.len()).all(|i| {
                hull.lower[i] - FP_TOLERANCE <= x[i] && x[i] <= hull.upper[i] + FP_TOLERANCE
            })
        }
    }
}

/// State of `trajectory` at the end of reachability step `k`, when the
/// trajectory was sampled `per_step` times per step.
fn state_after_step(trajectory: &Trajectory, k: usize, per_step: usize) -> &Array1<f64> {
    &trajectory.states[(k + 1) * per_step]
}
