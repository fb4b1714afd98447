//! Analysis options.
//!
//! [`ReachOptions`] is the only input surface of an analysis. It is
//! validated once, before the first step, against the state and input
//! dimensions of the system being analysed.

use ndarray::Array1;
use reach_core::{ReachError, Result};
use reach_zonotope::{ReductionConfig, Zonotope};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Linearization orders the nonlinear algorithm implements.
pub const SUPPORTED_TENSOR_ORDERS: [usize; 3] = [1, 2, 3];

/// Options for a reachability run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachOptions {
    /// Time horizon.
    pub t_end: f64,
    /// Time step `dt`.
    pub step: f64,
    /// Truncation order of the matrix-exponential series.
    pub taylor_terms: usize,
    /// Linearization-error model: 1 (Jacobian enclosure), 2 (Hessian
    /// enclosure) or 3 (Hessian at the linearization point plus a
    /// third-order remainder).
    pub tensor_order: usize,
    /// Initial sets, each propagated independently.
    pub r0: Vec<Zonotope>,
    /// Input uncertainty set.
    pub u: Zonotope,
    /// Constant input translation added to every input.
    pub u_trans: Array1<f64>,
    pub reduction: ReductionConfig,
    /// Iteration cap of the linearization-error fixed point.
    pub max_error_iterations: usize,
    /// Wall-clock budget checked between steps.
    pub timeout: Option<Duration>,
}

impl ReachOptions {
    /// Options with default tuning: 4 Taylor terms, second-order
    /// linearization error, Girard reduction to order 50, no input
    /// translation and no timeout.
    pub fn new(t_end: f64, step: f64, r0: Vec<Zonotope>, u: Zonotope) -> Self {
        let input_dim = u.dim();
        Self {
            t_end,
            step,
            taylor_terms: 4,
            tensor_order: 2,
            r0,
            u,
            u_trans: Array1::zeros(input_dim),
            reduction: ReductionConfig::default(),
            max_error_iterations: 50,
            timeout: None,
        }
    }

    pub fn with_taylor_terms(mut self, terms: usize) -> Self {
        self.taylor_terms = terms;
        self
    }

    pub fn with_tensor_order(mut self, order: usize) -> Self {
        self.tensor_order = order;
        self
    }

    pub fn with_reduction(mut self, reduction: ReductionConfig) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_input_translation(mut self, u_trans: Array1<f64>) -> Self {
        self.u_trans = u_trans;
        self
    }

    pub fn with_max_error_iterations(mut self, iterations: usize) -> Self {
        self.max_error_iterations = iterations;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of steps needed to reach `t_end`.
    ///
    /// A ratio within round-off of an integer counts as that integer, so
    /// a horizon of 5 with step 0.04 gives 125 steps.
    pub fn steps(&self) -> usize {
        step_count(self.t_end, self.step)
    }

    /// Dimension of the initial sets (0 if there are none).
    pub fn state_dim(&self) -> usize {
        self.r0.first().map(Zonotope::dim).unwrap_or(0)
    }

    /// Reject invalid options before any computation.
    pub fn validate(&self, state_dim: usize, input_dim: usize) -> Result<()> {
        if !(self.t_end.is_finite() && self.t_end > 0.0) {
            return Err(ReachError::Configuration(format!(
                "t_end must be positive and finite, got {}",
                self.t_end
            )));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(ReachError::Configuration(format!(
                "step must be positive and finite, got {}",
                self.step
            )));
        }
        if self.taylor_terms == 0 {
            return Err(ReachError::Configuration(
                "taylor_terms must be at least 1".to_string(),
            ));
        }
        if !SUPPORTED_TENSOR_ORDERS.contains(&self.tensor_order) {
            return Err(ReachError::UnsupportedConfiguration(format!(
                "tensor_order {} (supported: {:?})",
                self.tensor_order, SUPPORTED_TENSOR_ORDERS
            )));
        }
        if self.max_error_iterations == 0 {
            return Err(ReachError::Configuration(
                "max_error_iterations must be at least 1".to_string(),
            ));
        }
        self.reduction.validate()?;

        if self.r0.is_empty() {
            return Err(ReachError::Configuration(
                "r0 must contain at least one initial set".to_string(),
            ));
        }
        for (i, set) in self.r0.iter().enumerate() {
            if set.dim() != state_dim {
                return Err(ReachError::Configuration(format!(
                    "initial set {i} has dimension {}, system state has {state_dim}",
                    set.dim()
                )));
            }
            if !set.is_finite() {
                return Err(ReachError::Configuration(format!(
                    "initial set {i} has non-finite entries"
                )));
            }
        }
        if self.u.dim() != input_dim {
            return Err(ReachError::Configuration(format!(
                "input set has dimension {}, system input has {input_dim}",
                self.u.dim()
            )));
        }
        if self.u_trans.len() != input_dim {
            return Err(ReachError::Configuration(format!(
                "u_trans has length {}, system input has {input_dim}",
                self.u_trans.len()
            )));
        }
        if !self.u.is_finite() || self.u_trans.iter().any(|v| !v.is_finite()) {
            return Err(ReachError::Configuration(
                "input set has non-finite entries".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn step_count(t_end: f64, step: f64) -> usize {
    let ratio = t_end / step;
    let nearest = ratio.round();
    if (ratio - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest as usize
    } else {
        ratio.ceil() as usize
    }
}
