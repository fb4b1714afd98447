//! Nonlinear reachability by conservative linearization (ASB2008CDC).
//!
//! Each step linearizes the field at a point `p = (p_x, u_c)` ahead of
//! the current set's center, propagates the deviation `δ = x − p_x`
//! through the linear kernel, and adds the particular solution of the
//! linearization error. The error depends on the very set it enlarges,
//! so it is found by a short fixed-point iteration:
//!
//! 1. assume the error lies in `box(applied)`;
//! 2. enclose every state of the step in
//!    `R_max = ti_δ ⊕ error_solution(box(applied)) + p_x`;
//! 3. bound the true error over `R_max × U`;
//! 4. accept if it fits in `applied`, otherwise enlarge `applied` and
//!    go back to 1.
//!
//! The accepted error magnitude seeds the next step.

use crate::driver::{self, RunControl, StepKernel, StepSets};
use crate::dynamics::{DynamicsOracle, Evaluation};
use crate::linear::{self, error_solution, LinearSystem};
use crate::options::ReachOptions;
use crate::result::ReachOutcome;
use ndarray::{Array1, Array2, Zip};
use reach_core::{ReachError, Result};
use reach_interval::{Interval, IntervalVector};
use reach_zonotope::{ReductionConfig, Zonotope};
use tracing::{debug, info, trace};

/// Growth applied to an error bound that did not contain the true error.
const ERROR_GROWTH: f64 = 1.1;

/// A nonlinear system `x' = f(x, u)` given by its dynamics oracle.
#[derive(Debug, Clone)]
pub struct NonlinearSystem<O> {
    oracle: O,
}

impl<O: DynamicsOracle> NonlinearSystem<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn state_dim(&self) -> usize {
        self.oracle.state_dim()
    }

    pub fn input_dim(&self) -> usize {
        self.oracle.input_dim()
    }

    /// Run the whole horizon with [`Asb2008Cdc`].
    pub fn reach(&self, options: &ReachOptions) -> ReachOutcome {
        Asb2008Cdc.reach(self, options)
    }

    /// One step from `r` outside a full run.
    ///
    /// `applied` is the linearization-error bound to start from (zeros
    /// for a first step); it is replaced by the seed for the next step.
    /// `options` must be valid for this system.
    pub fn step(
        &self,
        r: &Zonotope,
        applied: &mut Array1<f64>,
        options: &ReachOptions,
    ) -> Result<StepSets> {
        reach_core::ensure_shape(&[self.state_dim()], &[applied.len()])?;
        NonlinearKernel::new(&self.oracle, options)?.advance(r, applied)
    }
}

/// Conservative-linearization algorithm with a Jacobian (order 1),
/// Hessian (order 2) or third-order (order 3) bound on the linearization
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Asb2008Cdc;

impl Asb2008Cdc {
    pub fn reach<O: DynamicsOracle>(
        &self,
        system: &NonlinearSystem<O>,
        options: &ReachOptions,
    ) -> ReachOutcome {
        self.reach_with(system, options, &RunControl::default())
    }

    pub fn reach_with<O: DynamicsOracle>(
        &self,
        system: &NonlinearSystem<O>,
        options: &ReachOptions,
        control: &RunControl<'_>,
    ) -> ReachOutcome {
        options.validate(system.state_dim(), system.input_dim())?;
        let oracle = system.oracle();
        if !oracle.supports(options.tensor_order) {
            return Err(ReachError::UnsupportedConfiguration(format!(
                "tensor_order {} needs derivatives the oracle '{}' does not provide (max order {})",
                options.tensor_order,
                oracle.name(),
                oracle.max_order()
            ))
            .into());
        }
        info!(
            "Nonlinear reachability ({}): n={}, dt={}, tensor_order={}",
            oracle.name(),
            system.state_dim(),
            options.step,
            options.tensor_order
        );
        let kernel = NonlinearKernel::new(oracle, options)?;
        driver::run(&kernel, options, control)
    }
}

/// Per-run constants of the nonlinear step.
struct NonlinearKernel<'a, O: ?Sized> {
    oracle: &'a O,
    step: f64,
    taylor_terms: usize,
    tensor_order: usize,
    reduction: ReductionConfig,
    max_iterations: usize,
    /// `U` translated by `u_trans`.
    input: Zonotope,
}

impl<'a, O: DynamicsOracle + ?Sized> NonlinearKernel<'a, O> {
    fn new(oracle: &'a O, options: &ReachOptions) -> Result<Self> {
        let input = options.u.translate(&options.u_trans)?;
        Ok(Self {
            oracle,
            step: options.step,
            taylor_terms: options.taylor_terms,
            tensor_order: options.tensor_order,
            reduction: options.reduction,
            max_iterations: options.max_error_iterations,
            input,
        })
    }

    fn evaluate(&self, x: &Array1<f64>, u: &Array1<f64>, order: usize) -> Result<Evaluation> {
        let eval = self.oracle.evaluate(x, u, order)?;
        eval.validate(self.oracle.state_dim(), self.oracle.input_dim(), order)?;
        Ok(eval)
    }

    /// Linearization point and the linear model of the deviation from it.
    fn linearize(&self, r: &Zonotope) -> Result<Linearization> {
        let u_c = self.input.center().clone();
        let drift = self.evaluate(r.center(), &u_c, 0)?.value;
        let p_x = r.center() + &(drift * (self.step / 2.0));

        // Order 3 expands exactly to second order at p.
        let point_order = if self.tensor_order >= 3 { 2 } else { 1 };
        let eval = self.evaluate(&p_x, &u_c, point_order)?;
        let (a, b) = match (eval.state_jacobian(), eval.input_jacobian()) {
            (Some(a), Some(b)) => (a.to_owned(), b.to_owned()),
            _ => return Err(ReachError::Oracle("oracle returned no Jacobian".to_string())),
        };
        for (what, m) in [("state Jacobian", &a), ("input Jacobian", &b)] {
            if m.iter().any(|v| !v.is_finite()) {
                return Err(ReachError::degenerate(
                    format!("{what} at linearization point"),
                    norm_inf(m),
                ));
            }
        }
        let system = LinearSystem::new(a, Some(b), Some(eval.value.clone()))?;
        Ok(Linearization {
            p_x,
            u_c,
            system,
            point: eval,
        })
    }

    /// Enclosure of `f(z) − f(p) − J(p)·(z − p)` for `z ∈ x_box × u_box`.
    fn linearization_error(
        &self,
        lin: &Linearization,
        x_box: &IntervalVector,
        u_box: &IntervalVector,
    ) -> Result<IntervalVector> {
        let (n, m) = (self.oracle.state_dim(), self.oracle.input_dim());
        let enclosure = self.oracle.evaluate_enclosure(x_box, u_box, self.tensor_order)?;
        if !enclosure.is_finite() {
            return Err(ReachError::degenerate(
                "field enclosure over the linearization-error box",
                max_abs(&x_box.mag()),
            ));
        }
        enclosure.validate(n, m, self.tensor_order)?;
        let dz = x_box
            .translate(&-&lin.p_x)?
            .concat(&u_box.translate(&-&lin.u_c)?);

        match self.tensor_order {
            1 => {
                let (Some(jac_box), Some(jac_p)) = (&enclosure.jacobian, &lin.point.jacobian) else {
                    return Err(ReachError::Oracle("oracle returned no Jacobian".to_string()));
                };
                jac_box.sub_point(jac_p)?.mul_vector(&dz)
            }
            2 => {
                let Some(hessians) = &enclosure.hessians else {
                    return Err(ReachError::Oracle("oracle returned no Hessians".to_string()));
                };
                let dz = dz.to_intervals();
                let error: Vec<Interval> = hessians
                    .iter()
                    .map(|h| half_quadratic(&dz, |a, b| h.get(a, b)))
                    .collect();
                Ok(IntervalVector::from_intervals(&error))
            }
            3 => {
                let (Some(hessians), Some(third)) = (&lin.point.hessians, &enclosure.third_order)
                else {
                    return Err(ReachError::Oracle(
                        "oracle returned no Hessians or third-order tensors".to_string(),
                    ));
                };
                let dz = dz.to_intervals();
                let error: Vec<Interval> = hessians
                    .iter()
                    .zip(third)
                    .map(|(h, t)| {
                        let quadratic = half_quadratic(&dz, |a, b| Interval::point(h[[a, b]]));
                        let mut cubic = Interval::zero();
                        for a in 0..dz.len() {
                            for b in 0..dz.len() {
                                let ab = dz[a] * dz[b];
                                for c in 0..dz.len() {
                                    cubic = cubic + t.get(a, b, c) * (ab * dz[c]);
                                }
                            }
                        }
                        quadratic + cubic * (1.0 / 6.0)
                    })
                    .collect();
                Ok(IntervalVector::from_intervals(&error))
            }
            order => Err(ReachError::UnsupportedConfiguration(format!(
                "tensor_order {order}"
            ))),
        }
    }
}

/// Result of linearizing at one step.
struct Linearization {
    p_x: Array1<f64>,
    u_c: Array1<f64>,
    /// `δ' = A·δ + B·u + f(p)`.
    system: LinearSystem,
    /// Oracle output at `p`, with the Jacobian.
    point: Evaluation,
}

impl<O: DynamicsOracle + ?Sized> StepKernel for NonlinearKernel<'_, O> {
    /// Linearization-error bound to start the next step from.
    type Carry = Array1<f64>;

    fn initial_carry(&self, r0: &Zonotope) -> Array1<f64> {
        Array1::zeros(r0.dim())
    }

    fn advance(&self, current: &Zonotope, applied: &mut Array1<f64>) -> Result<StepSets> {
        let lin = self.linearize(current)?;
        let cache = lin.system.taylor_cache(self.step, self.taylor_terms)?;

        // Uncertain input relative to u_c; the constant part is f(p).
        let centered_input = Zonotope::new(
            Array1::zeros(self.input.dim()),
            self.input.generators().clone(),
        )?;
        let inputs = lin
            .system
            .split_inputs(&centered_input, &Array1::zeros(self.input.dim()))?;
        let deviation = current.translate(&-&lin.p_x)?;
        let sets = linear::propagate(&cache, &deviation, &inputs, &self.reduction)?;

        let linearization_point = IntervalVector::from_point(&lin.p_x);
        let u_box = self
            .input
            .interval_hull()
            .hull(&IntervalVector::from_point(&lin.u_c))?;

        let mut bound = applied.clone();
        for iteration in 1..=self.max_iterations {
            if bound.iter().any(|v| !v.is_finite()) {
                return Err(ReachError::degenerate("linearization error bound", max_abs(&bound)));
            }
            let assumed = Zonotope::from_interval(&IntervalVector::symmetric(&bound));
            let r_max = sets
                .time_interval
                .minkowski_sum(&error_solution(&cache, &assumed)?)?;
            if !r_max.is_finite() {
                return Err(ReachError::degenerate(
                    "set enlarged by the linearization error bound",
                    max_abs(&bound),
                ));
            }
            let x_box = r_max
                .interval_hull()
                .translate(&lin.p_x)?
                .hull(&linearization_point)?;

            let error = self.linearization_error(&lin, &x_box, &u_box)?;
            let magnitude = error.mag();
            if !error.is_finite() {
                return Err(ReachError::degenerate("linearization error", max_abs(&magnitude)));
            }
            trace!(
                "Error iteration {}: bound {:?}, true error {:?}",
                iteration,
                bound.as_slice(),
                magnitude.as_slice()
            );

            if Zip::from(&magnitude).and(&bound).all(|&e, &b| e <= b) {
                // Symmetric, so the solution also covers every instant before dt.
                let accepted = Zonotope::from_interval(&IntervalVector::symmetric(&magnitude));
                let r_error = error_solution(&cache, &accepted)?;
                let time_point = sets
                    .time_point
                    .minkowski_sum(&r_error)?
                    .translate(&lin.p_x)?
                    .reduce(&self.reduction);
                let time_interval = sets
                    .time_interval
                    .minkowski_sum(&r_error)?
                    .translate(&lin.p_x)?
                    .reduce(&self.reduction);
                *applied = magnitude * ERROR_GROWTH;
                debug!(
                    "Nonlinear step: {} error iterations, {} generators",
                    iteration,
                    time_point.generator_count()
                );
                return Ok(StepSets {
                    time_point,
                    time_interval,
                    error_iterations: iteration,
                });
            }

            Zip::from(&mut bound)
                .and(&magnitude)
                .for_each(|b, &e| *b = b.max(e * ERROR_GROWTH));
        }

        Err(ReachError::degenerate(
            format!(
                "linearization error did not settle within {} iterations",
                self.max_iterations
            ),
            max_abs(&bound),
        ))
    }
}

/// `½·Σₐ_b hₐ_b·dzₐ·dz_b`, with exact squares on the diagonal.
fn half_quadratic(dz: &[Interval], h: impl Fn(usize, usize) -> Interval) -> Interval {
    let mut acc = Interval::zero();
    for a in 0..dz.len() {
        acc = acc + h(a, a) * dz[a].sqr();
        for b in (a + 1)..dz.len() {
            acc = acc + (h(a, b) + h(b, a)) * (dz[a] * dz[b]);
        }
    }
    acc * 0.5
}

fn max_abs(v: &Array1<f64>) -> f64 {
    v.fold(0.0, |acc, x| acc.max(x.abs()))
}

fn norm_inf(m: &Array2<f64>) -> f64 {
    m.rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}
