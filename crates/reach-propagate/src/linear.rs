//! Reachability of linear systems `x' = A·x + B·u + c`.
//!
//! One step from a set `R` over `[0, dt]`:
//!
//! - time point: `T·R ⊕ E·R ⊕ R_trans ⊕ R_V`
//! - time interval: `enclose(R, T·R ⊕ R_trans) ⊕ F·R ⊕ G·v_trans ⊕ R_V`
//!
//! where `T`, `E`, `F` and `G` come from the [`TaylorCache`], `v_trans`
//! is the constant part of the input and `V` its centered uncertain part.
//! `R_trans` and `R_V` are the particular solutions for the constant and
//! the uncertain input.

use crate::driver::{self, RunControl, StepKernel, StepSets};
use crate::dynamics::{DynamicsOracle, Evaluation, IntervalEvaluation, IntervalTensor3};
use crate::options::ReachOptions;
use crate::result::ReachOutcome;
use crate::taylor::TaylorCache;
use ndarray::{s, Array1, Array2, Array3};
use reach_core::{ReachError, Result};
use reach_interval::{point_mul_vector, IntervalMatrix, IntervalVector};
use reach_zonotope::{ReductionConfig, Zonotope};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Input of one step, split into its constant and uncertain parts.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInputs {
    /// Constant input in state coordinates: `center(B·U) + B·u_trans + c`.
    pub v_trans: Array1<f64>,
    /// Centered uncertain input `B·U − center(B·U)`.
    pub uncertain: Zonotope,
}

impl StepInputs {
    /// No input at all.
    pub fn zero(state_dim: usize) -> Self {
        Self {
            v_trans: Array1::zeros(state_dim),
            uncertain: Zonotope::zero(state_dim),
        }
    }
}

/// Linear time-invariant system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSystem {
    a: Array2<f64>,
    b: Option<Array2<f64>>,
    c: Option<Array1<f64>>,
}

impl LinearSystem {
    /// Validate and build. Without `b` the input enters the state directly.
    pub fn new(a: Array2<f64>, b: Option<Array2<f64>>, c: Option<Array1<f64>>) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(ReachError::Configuration(format!(
                "A must be square, got {}x{}",
                n,
                a.ncols()
            )));
        }
        if let Some(b) = &b {
            if b.nrows() != n {
                return Err(ReachError::Configuration(format!(
                    "B has {} rows, A has {}",
                    b.nrows(),
                    n
                )));
            }
        }
        if let Some(c) = &c {
            if c.len() != n {
                return Err(ReachError::Configuration(format!(
                    "c has length {}, A has {} rows",
                    c.len(),
                    n
                )));
            }
        }
        let finite = a.iter().all(|v| v.is_finite())
            && b.iter().flat_map(|m| m.iter()).all(|v| v.is_finite())
            && c.iter().flat_map(|v| v.iter()).all(|v| v.is_finite());
        if !finite {
            return Err(ReachError::Configuration(
                "system matrices contain non-finite entries".to_string(),
            ));
        }
        Ok(Self { a, b, c })
    }

    /// `x' = A·x + u`.
    pub fn autonomous(a: Array2<f64>) -> Result<Self> {
        Self::new(a, None, None)
    }

    pub fn a(&self) -> &Array2<f64> {
        &self.a
    }

    pub fn b(&self) -> Option<&Array2<f64>> {
        self.b.as_ref()
    }

    pub fn c(&self) -> Option<&Array1<f64>> {
        self.c.as_ref()
    }

    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn input_dim(&self) -> usize {
        self.b.as_ref().map_or(self.state_dim(), Array2::ncols)
    }

    pub fn taylor_cache(&self, step: f64, terms: usize) -> Result<TaylorCache> {
        TaylorCache::compute(&self.a, step, terms)
    }

    /// `B·U`, or `U` itself without an input matrix.
    pub fn input_map(&self, u: &Zonotope) -> Result<Zonotope> {
        match &self.b {
            Some(b) => u.linear_map(b),
            None => {
                reach_core::ensure_shape(&[self.state_dim()], &[u.dim()])?;
                Ok(u.clone())
            }
        }
    }

    /// Split `U` (translated by `u_trans`) into constant and uncertain parts.
    pub fn split_inputs(&self, u: &Zonotope, u_trans: &Array1<f64>) -> Result<StepInputs> {
        reach_core::ensure_shape(&[u.dim()], &[u_trans.len()])?;
        let v = self.input_map(&u.translate(u_trans)?)?;
        let mut v_trans = v.center().clone();
        if let Some(c) = &self.c {
            v_trans += c;
        }
        let uncertain = Zonotope::new(Array1::zeros(v.dim()), v.generators().clone())?
            .remove_zero_generators();
        Ok(StepInputs { v_trans, uncertain })
    }

    fn check_cache(&self, cache: &TaylorCache) -> Result<()> {
        reach_core::ensure_shape(&[self.state_dim()], &[cache.dim()])
    }

    /// Particular solution for the uncertain input `V` over one step.
    ///
    /// Zero when `V` is the origin. Otherwise
    /// `dt·V ⊕ Σ_{k=1}^{terms} Aᵏ·dt^(k+1)/(k+1)!·V ⊕ E·dt·V`.
    pub fn input_solution(&self, cache: &TaylorCache, v: &Zonotope) -> Result<Zonotope> {
        self.check_cache(cache)?;
        error_solution(cache, v)
    }

    /// Particular solution for the constant input `v_trans` over one step:
    /// `Asum·v_trans ⊕ E·dt·v_trans`.
    pub fn constant_input_solution(
        &self,
        cache: &TaylorCache,
        v_trans: &Array1<f64>,
    ) -> Result<Zonotope> {
        self.check_cache(cache)?;
        constant_solution(cache, v_trans)
    }

    /// One step from `r`; both sets are reduced with `reduction`.
    pub fn step(
        &self,
        cache: &TaylorCache,
        r: &Zonotope,
        inputs: &StepInputs,
        reduction: &ReductionConfig,
    ) -> Result<StepSets> {
        self.check_cache(cache)?;
        propagate(cache, r, inputs, reduction)
    }

    /// Run the whole horizon.
    pub fn reach(&self, options: &ReachOptions) -> ReachOutcome {
        self.reach_with(options, &RunControl::default())
    }

    pub fn reach_with(&self, options: &ReachOptions, control: &RunControl<'_>) -> ReachOutcome {
        options.validate(self.state_dim(), self.input_dim())?;
        info!(
            "Linear reachability: n={}, dt={}, taylor_terms={}",
            self.state_dim(),
            options.step,
            options.taylor_terms
        );
        let kernel = LinearKernel {
            cache: self.taylor_cache(options.step, options.taylor_terms)?,
            inputs: self.split_inputs(&options.u, &options.u_trans)?,
            reduction: options.reduction,
        };
        driver::run(&kernel, options, control)
    }
}

/// Particular solution of `δ' = A·δ + w`, `w ∈ W`, over one step.
///
/// Used both for the uncertain input and for linearization-error sets.
pub fn error_solution(cache: &TaylorCache, w: &Zonotope) -> Result<Zonotope> {
    reach_core::ensure_shape(&[cache.dim()], &[w.dim()])?;
    if w.is_origin() {
        return Ok(Zonotope::zero(w.dim()));
    }
    let mut out = w.scale(cache.step());
    for k in 1..=cache.terms() {
        let power = cache
            .power(k)
            .ok_or_else(|| ReachError::Configuration(format!("Taylor cache lacks A^{k}")))?;
        out = out.minkowski_sum(&w.linear_map(&(power * cache.factors()[k]))?)?;
    }
    let bloat = w.interval_matrix_map(&cache.remainder().scale(cache.step()))?;
    out.minkowski_sum(&bloat)
}

fn constant_solution(cache: &TaylorCache, v_trans: &Array1<f64>) -> Result<Zonotope> {
    reach_core::ensure_shape(&[cache.dim()], &[v_trans.len()])?;
    Zonotope::point(v_trans.clone())
        .linear_map(cache.input_sum())?
        .minkowski_sum(
            &Zonotope::point(v_trans.clone())
                .interval_matrix_map(&cache.remainder().scale(cache.step()))?,
        )
}

/// `T ± W` as one interval matrix, so `T·R ⊕ E·R` is a single map.
fn propagator_enclosure(cache: &TaylorCache) -> IntervalMatrix {
    let t = cache.propagator();
    let e = cache.remainder();
    IntervalMatrix {
        lower: t + &e.lower,
        upper: t + &e.upper,
    }
}

/// The one-step combination shared by the linear and nonlinear kernels.
pub(crate) fn propagate(
    cache: &TaylorCache,
    r: &Zonotope,
    inputs: &StepInputs,
    reduction: &ReductionConfig,
) -> Result<StepSets> {
    reach_core::ensure_shape(&[cache.dim()], &[r.dim()])?;
    let r_trans = constant_solution(cache, &inputs.v_trans)?;
    let r_v = error_solution(cache, &inputs.uncertain)?;

    let homogeneous = r.linear_map(cache.propagator())?;
    let time_point = r
        .interval_matrix_map(&propagator_enclosure(cache))?
        .minkowski_sum(&r_trans)?
        .minkowski_sum(&r_v)?;

    let input_correction =
        Zonotope::point(inputs.v_trans.clone()).interval_matrix_map(cache.input_correction())?;
    let time_interval = r
        .enclose(&homogeneous.minkowski_sum(&r_trans)?)?
        .minkowski_sum(&r.interval_matrix_map(cache.curvature())?)?
        .minkowski_sum(&input_correction)?
        .minkowski_sum(&r_v)?;

    Ok(StepSets {
        time_point: time_point.reduce(reduction),
        time_interval: time_interval.reduce(reduction),
        error_iterations: 0,
    })
}

/// Linear step kernel: one cache and one input split for the whole run.
struct LinearKernel {
    cache: TaylorCache,
    inputs: StepInputs,
    reduction: ReductionConfig,
}

impl StepKernel for LinearKernel {
    type Carry = ();

    fn initial_carry(&self, _r0: &Zonotope) {}

    fn advance(&self, current: &Zonotope, _carry: &mut ()) -> Result<StepSets> {
        let sets = propagate(&self.cache, current, &self.inputs, &self.reduction)?;
        debug!(
            "Linear step: {} -> {} generators",
            current.generator_count(),
            sets.time_point.generator_count()
        );
        Ok(sets)
    }
}

/// A linear system is its own exact oracle: constant Jacobian `[A B]`,
/// zero higher derivatives.
impl DynamicsOracle for LinearSystem {
    fn name(&self) -> &str {
        "linear"
    }

    fn state_dim(&self) -> usize {
        LinearSystem::state_dim(self)
    }

    fn input_dim(&self) -> usize {
        LinearSystem::input_dim(self)
    }

    fn max_order(&self) -> usize {
        3
    }

    fn evaluate(&self, x: &Array1<f64>, u: &Array1<f64>, order: usize) -> Result<Evaluation> {
        let (n, m) = (self.state_dim(), self.input_dim());
        reach_core::ensure_shape(&[n, m], &[x.len(), u.len()])?;
        check_order(order)?;
        let mut value = self.a.dot(x);
        match &self.b {
            Some(b) => value += &b.dot(u),
            None => value += u,
        }
        if let Some(c) = &self.c {
            value += c;
        }
        let jacobian = (order >= 1).then(|| self.stacked_jacobian());
        let hessians = (order >= 2).then(|| vec![Array2::zeros((n + m, n + m)); n]);
        let third_order =
            (order >= 3).then(|| vec![Array3::zeros((n + m, n + m, n + m)); n]);
        Ok(Evaluation {
            value,
            jacobian,
            hessians,
            third_order,
        })
    }

    fn evaluate_enclosure(
        &self,
        x: &IntervalVector,
        u: &IntervalVector,
        order: usize,
    ) -> Result<IntervalEvaluation> {
        let (n, m) = (self.state_dim(), self.input_dim());
        reach_core::ensure_shape(&[n, m], &[x.len(), u.len()])?;
        check_order(order)?;
        let mut value = point_mul_vector(&self.a, x)?;
        value = match &self.b {
            Some(b) => value.checked_add(&point_mul_vector(b, u)?)?,
            None => value.checked_add(u)?,
        };
        if let Some(c) = &self.c {
            value = value.translate(c)?;
        }
        let jacobian =
            (order >= 1).then(|| IntervalMatrix::from_point(&self.stacked_jacobian()));
        let hessians = (order >= 2).then(|| vec![IntervalMatrix::zeros(n + m, n + m); n]);
        let third_order = (order >= 3).then(|| vec![IntervalTensor3::zeros(n + m); n]);
        Ok(IntervalEvaluation {
            value,
            jacobian,
            hessians,
            third_order,
        })
    }
}

fn check_order(order: usize) -> Result<()> {
    if order > 3 {
        return Err(ReachError::UnsupportedConfiguration(format!(
            "derivative order {order} for a linear system"
        )));
    }
    Ok(())
}

impl LinearSystem {
    /// `[A B]`, with `B = I` when there is no input matrix.
    fn stacked_jacobian(&self) -> Array2<f64> {
        let n = self.state_dim();
        let b = self.b.clone().unwrap_or_else(|| Array2::eye(n));
        let mut j = Array2::zeros((n, n + b.ncols()));
        j.slice_mut(s![.., ..n]).assign(&self.a);
        j.slice_mut(s![.., n..]).assign(&b);
        j
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn system() -> LinearSystem {
        LinearSystem::new(
            arr2(&[[-1.0, -4.0], [4.0, -1.0]]),
            Some(arr2(&[[1.0], [1.0]])),
            None,
        )
        .unwrap()
    }

    fn initial() -> Zonotope {
        Zonotope::from_bounds(arr1(&[0.9, 0.9]), arr1(&[1.1, 1.1])).unwrap()
    }

    #[test]
    fn test_construction_checks_shapes() {
        assert!(LinearSystem::new(Array2::zeros((2, 3)), None, None).is_err());
        assert!(LinearSystem::new(Array2::eye(2), Some(Array2::zeros((3, 1))), None).is_err());
        assert!(LinearSystem::new(Array2::eye(2), None, Some(arr1(&[1.0]))).is_err());
        let mut a = Array2::eye(2);
        a[[0, 1]] = f64::INFINITY;
        assert!(LinearSystem::autonomous(a).is_err());
        assert_eq!(system().input_dim(), 1);
        assert_eq!(LinearSystem::autonomous(Array2::eye(3)).unwrap().input_dim(), 3);
    }

    #[test]
    fn test_split_inputs() {
        let sys = LinearSystem::new(
            arr2(&[[-1.0, 0.0], [0.0, -2.0]]),
            Some(arr2(&[[1.0], [2.0]])),
            Some(arr1(&[0.5, 0.0])),
        )
        .unwrap();
        let u = Zonotope::from_bounds(arr1(&[0.1]), arr1(&[0.3])).unwrap();
        let inputs = sys.split_inputs(&u, &arr1(&[1.0])).unwrap();
        assert!((inputs.v_trans[0] - 1.7).abs() < 1e-15);
        assert!((inputs.v_trans[1] - 2.4).abs() < 1e-15);
        assert_eq!(inputs.uncertain.center(), &arr1(&[0.0, 0.0]));
        assert_eq!(inputs.uncertain.generator_count(), 1);
    }

    #[test]
    fn test_degenerate_input_contributes_exactly_zero() {
        let sys = system();
        let cache = sys.taylor_cache(0.04, 4).unwrap();
        let rv = sys.input_solution(&cache, &Zonotope::zero(2)).unwrap();
        assert!(rv.is_origin());
        assert_eq!(rv.generator_count(), 0);

        let inputs = sys.split_inputs(&Zonotope::zero(1), &arr1(&[0.0])).unwrap();
        assert_eq!(inputs, StepInputs::zero(2));
        let reduction = ReductionConfig::default();
        let sets = sys.step(&cache, &initial(), &inputs, &reduction).unwrap();
        let expected = initial()
            .interval_matrix_map(&propagator_enclosure(&cache))
            .unwrap()
            .reduce(&reduction);
        assert_eq!(sets.time_point.center(), expected.center());
        assert_eq!(sets.time_point.radius(), expected.radius());
    }

    #[test]
    fn test_constant_input_solution_matches_integral() {
        // x' = −x + 1 from 0: x(dt) = 1 − e^{−dt}
        let sys = LinearSystem::autonomous(arr2(&[[-1.0]])).unwrap();
        let cache = sys.taylor_cache(0.1, 6).unwrap();
        let z = sys.constant_input_solution(&cache, &arr1(&[1.0])).unwrap();
        let exact = 1.0 - (-0.1f64).exp();
        let hull = z.interval_hull();
        assert!(hull.lower[0] <= exact && exact <= hull.upper[0]);
        assert!(hull.upper[0] - hull.lower[0] < 1e-8);
    }

    #[test]
    fn test_input_solution_encloses_extreme_inputs() {
        // x' = −x + w with w ∈ [−1, 1]: constant w = ±1 reaches ±(1 − e^{−dt})
        let sys = LinearSystem::autonomous(arr2(&[[-1.0]])).unwrap();
        let cache = sys.taylor_cache(0.1, 4).unwrap();
        let v = Zonotope::from_bounds(arr1(&[-1.0]), arr1(&[1.0])).unwrap();
        let rv = sys.input_solution(&cache, &v).unwrap();
        let reach = 1.0 - (-0.1f64).exp();
        assert!(rv.support(&arr1(&[1.0])).unwrap() >= reach);
        assert!(rv.support(&arr1(&[-1.0])).unwrap() >= reach);
    }

    #[test]
    fn test_time_interval_contains_both_endpoints() {
        let sys = system();
        let cache = sys.taylor_cache(0.04, 4).unwrap();
        let inputs = StepInputs::zero(2);
        let sets = sys
            .step(&cache, &initial(), &inputs, &ReductionConfig::default())
            .unwrap();
        for d in [arr1(&[1.0, 0.0]), arr1(&[0.0, -1.0]), arr1(&[1.0, 1.0]), arr1(&[-1.0, 0.5])] {
            let ti = sets.time_interval.support(&d).unwrap();
            assert!(initial().support(&d).unwrap() <= ti + 1e-12);
            assert!(sets.time_point.support(&d).unwrap() <= ti + 1e-9);
        }
    }

    #[test]
    fn test_cache_dimension_checked() {
        let sys = system();
        let cache = TaylorCache::compute(&Array2::eye(3), 0.1, 2).unwrap();
        let err = sys
            .step(&cache, &initial(), &StepInputs::zero(2), &ReductionConfig::default())
            .unwrap_err();
        assert!(matches!(err, ReachError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_linear_system_as_oracle() {
        let sys = LinearSystem::new(
            arr2(&[[0.0, 1.0], [-2.0, -3.0]]),
            Some(arr2(&[[0.0], [1.0]])),
            Some(arr1(&[0.5, 0.0])),
        )
        .unwrap();
        let e = sys.evaluate(&arr1(&[1.0, 2.0]), &arr1(&[3.0]), 2).unwrap();
        e.validate(2, 1, 2).unwrap();
        assert_eq!(e.value, arr1(&[2.5, -5.0]));
        assert_eq!(e.jacobian.unwrap(), arr2(&[[0.0, 1.0, 0.0], [-2.0, -3.0, 1.0]]));

        let x = IntervalVector::new(arr1(&[0.9, 1.9]), arr1(&[1.1, 2.1])).unwrap();
        let u = IntervalVector::from_point(&arr1(&[3.0]));
        let enc = sys.evaluate_enclosure(&x, &u, 1).unwrap();
        assert!(enc.value.contains_point(&arr1(&[2.5, -5.0])));
    }

    #[test]
    fn test_reach_rejects_bad_options() {
        let sys = system();
        let mut options = ReachOptions::new(1.0, 0.1, vec![initial()], Zonotope::zero(1));
        options.step = -0.1;
        let failure = sys.reach(&options).unwrap_err();
        assert_eq!(failure.step, None);
        assert!(matches!(failure.source, ReachError::Configuration(_)));
    }
}
