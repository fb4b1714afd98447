//! Fixed-step trajectory simulation with classical Runge–Kutta.
//!
//! Used to draw sample trajectories that a computed reachable set must
//! contain. The input is held constant over the whole horizon.

use crate::dynamics::DynamicsOracle;
use crate::options::step_count;
use ndarray::Array1;
use reach_core::{ReachError, Result};
use tracing::debug;

/// Sampled trajectory; `states[i]` is the state at `times[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<Array1<f64>>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State at `t_end`.
    pub fn final_state(&self) -> Option<&Array1<f64>> {
        self.states.last()
    }
}

/// Integrate `x' = f(x, u)` from `x0` up to `t_end` with RK4 steps of
/// size `step` (the last one shortened to land on `t_end`).
pub fn simulate(
    oracle: &dyn DynamicsOracle,
    x0: &Array1<f64>,
    u: &Array1<f64>,
    t_end: f64,
    step: f64,
) -> Result<Trajectory> {
    if !(t_end.is_finite() && t_end >= 0.0 && step.is_finite() && step > 0.0) {
        return Err(ReachError::Configuration(format!(
            "simulation needs t_end >= 0 and step > 0, got t_end={t_end}, step={step}"
        )));
    }
    if x0.len() != oracle.state_dim() || u.len() != oracle.input_dim() {
        return Err(ReachError::Configuration(format!(
            "simulation of '{}' needs x0 of length {} and u of length {}, got {} and {}",
            oracle.name(),
            oracle.state_dim(),
            oracle.input_dim(),
            x0.len(),
            u.len()
        )));
    }

    let field = |x: &Array1<f64>| -> Result<Array1<f64>> {
        let eval = oracle.evaluate(x, u, 0)?;
        eval.validate(oracle.state_dim(), oracle.input_dim(), 0)?;
        Ok(eval.value)
    };

    let steps = step_count(t_end, step);
    let mut times = Vec::with_capacity(steps + 1);
    let mut states = Vec::with_capacity(steps + 1);
    let mut t = 0.0;
    let mut x = x0.clone();
    times.push(t);
    states.push(x.clone());

    for i in 1..=steps {
        let next_t = (i as f64 * step).min(t_end);
        let h = next_t - t;
        let k1 = field(&x)?;
        let k2 = field(&(&x + &(&k1 * (h / 2.0))))?;
        let k3 = field(&(&x + &(&k2 * (h / 2.0))))?;
        let k4 = field(&(&x + &(&k3 * h)))?;
        x = &x + &((k1 + &(k2 * 2.0) + &(k3 * 2.0) + &k4) * (h / 6.0));
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ReachError::degenerate(
                format!("trajectory of '{}' at t={next_t}", oracle.name()),
                x.iter().fold(0.0, |acc, v| acc.max(v.abs())),
            ));
        }
        t = next_t;
        times.push(t);
        states.push(x.clone());
    }

    debug!("Simulated '{}' for {} steps", oracle.name(), steps);
    Ok(Trajectory { times, states })
}
