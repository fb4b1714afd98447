//! Dynamics oracle: the vector field `x' = f(x, u)` and its derivatives.
//!
//! A concrete system implements [`VectorField`] once, generically over
//! [`Scalar`]. Wrapping it in a [`Model`] yields a [`DynamicsOracle`] that
//! evaluates the field with its Jacobian and Hessians both at points and
//! over interval boxes. Derivative order 0 returns the value only, order 1
//! adds the Jacobian, order 2 the Hessians and order 3 the third-derivative
//! tensors. Derivatives are taken with respect to the stacked vector
//! `z = (x, u)`.

pub mod jet;

pub use jet::Jet;

use ndarray::{s, Array1, Array2, Array3, ArrayView2};
use reach_core::{ReachError, Result};
use reach_interval::{Interval, IntervalMatrix, IntervalVector, Scalar};

/// A vector field written once for every [`Scalar`].
pub trait VectorField: Send + Sync {
    fn name(&self) -> &str;

    fn state_dim(&self) -> usize;

    fn input_dim(&self) -> usize;

    /// `f(x, u)`; must return `state_dim()` components.
    fn eval<S: Scalar>(&self, x: &[S], u: &[S]) -> Vec<S>;
}

/// Point evaluation of the field and its derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Array1<f64>,
    /// `n × (n + m)`; present for order ≥ 1.
    pub jacobian: Option<Array2<f64>>,
    /// One `(n + m) × (n + m)` matrix per component; present for order ≥ 2.
    pub hessians: Option<Vec<Array2<f64>>>,
    /// One `(n + m)³` tensor per component; present for order 3.
    pub third_order: Option<Vec<Array3<f64>>>,
}

/// Enclosure of the field and its derivatives over a box.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalEvaluation {
    pub value: IntervalVector,
    pub jacobian: Option<IntervalMatrix>,
    pub hessians: Option<Vec<IntervalMatrix>>,
    pub third_order: Option<Vec<IntervalTensor3>>,
}

/// Enclosure of a third-derivative tensor `∂³fᵢ/∂zₐ∂z_b∂z_c`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalTensor3 {
    pub lower: Array3<f64>,
    pub upper: Array3<f64>,
}

impl IntervalTensor3 {
    pub fn zeros(vars: usize) -> Self {
        Self {
            lower: Array3::zeros((vars, vars, vars)),
            upper: Array3::zeros((vars, vars, vars)),
        }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.lower.dim()
    }

    pub fn get(&self, a: usize, b: usize, c: usize) -> Interval {
        Interval::new(self.lower[[a, b, c]], self.upper[[a, b, c]])
    }

    pub fn is_finite(&self) -> bool {
        self.lower.iter().chain(self.upper.iter()).all(|v| v.is_finite())
    }

    pub fn contains_point(&self, t: &Array3<f64>) -> bool {
        t.dim() == self.dim()
            && ndarray::Zip::from(t)
                .and(&self.lower)
                .and(&self.upper)
                .all(|&v, &lo, &hi| lo <= v && v <= hi)
    }
}

impl Evaluation {
    /// Check shapes against the oracle's declared dimensions.
    pub fn validate(&self, state_dim: usize, input_dim: usize, order: usize) -> Result<()> {
        let vars = state_dim + input_dim;
        check_len("field value", state_dim, self.value.len())?;
        if self.value.iter().any(|v| !v.is_finite()) {
            return Err(ReachError::Oracle(format!(
                "non-finite field value {}",
                self.value
            )));
        }
        if order >= 1 {
            let jac = require(self.jacobian.as_ref(), "Jacobian")?;
            check_dims("Jacobian", (state_dim, vars), jac.dim())?;
            if jac.iter().any(|v| !v.is_finite()) {
                return Err(ReachError::Oracle("non-finite Jacobian".to_string()));
            }
        }
        if order >= 2 {
            let hess = require(self.hessians.as_ref(), "Hessians")?;
            check_len("Hessian list", state_dim, hess.len())?;
            for h in hess {
                check_dims("Hessian", (vars, vars), h.dim())?;
                if h.iter().any(|v| !v.is_finite()) {
                    return Err(ReachError::Oracle("non-finite Hessian".to_string()));
                }
            }
        }
        if order >= 3 {
            let third = require(self.third_order.as_ref(), "third-order tensors")?;
            check_len("third-order tensor list", state_dim, third.len())?;
            for t in third {
                check_cube("third-order tensor", vars, t.dim())?;
                if t.iter().any(|v| !v.is_finite()) {
                    return Err(ReachError::Oracle("non-finite third-order tensor".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Columns of the Jacobian belonging to the state.
    pub fn state_jacobian(&self) -> Option<ArrayView2<'_, f64>> {
        let n = self.value.len();
        self.jacobian.as_ref().map(|j| j.slice(s![.., ..n]))
    }

    /// Columns of the Jacobian belonging to the input.
    pub fn input_jacobian(&self) -> Option<ArrayView2<'_, f64>> {
        let n = self.value.len();
        self.jacobian.as_ref().map(|j| j.slice(s![.., n..]))
    }
}

impl IntervalEvaluation {
    pub fn validate(&self, state_dim: usize, input_dim: usize, order: usize) -> Result<()> {
        let vars = state_dim + input_dim;
        check_len("field enclosure", state_dim, self.value.len())?;
        if !self.value.is_finite() {
            return Err(ReachError::Oracle(
                "field enclosure is unbounded or undefined".to_string(),
            ));
        }
        if order >= 1 {
            let jac = require(self.jacobian.as_ref(), "Jacobian enclosure")?;
            check_dims("Jacobian enclosure", (state_dim, vars), jac.shape())?;
            if !jac.is_finite() {
                return Err(ReachError::Oracle(
                    "Jacobian enclosure is unbounded or undefined".to_string(),
                ));
            }
        }
        if order >= 2 {
            let hess = require(self.hessians.as_ref(), "Hessian enclosures")?;
            check_len("Hessian enclosure list", state_dim, hess.len())?;
            for h in hess {
                check_dims("Hessian enclosure", (vars, vars), h.shape())?;
                if !h.is_finite() {
                    return Err(ReachError::Oracle(
                        "Hessian enclosure is unbounded or undefined".to_string(),
                    ));
                }
            }
        }
        if order >= 3 {
            let third = require(self.third_order.as_ref(), "third-order enclosures")?;
            check_len("third-order enclosure list", state_dim, third.len())?;
            for t in third {
                check_cube("third-order enclosure", vars, t.dim())?;
                if !t.is_finite() {
                    return Err(ReachError::Oracle(
                        "third-order enclosure is unbounded or undefined".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Whether every part present is bounded.
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
            && self.jacobian.as_ref().map_or(true, IntervalMatrix::is_finite)
            && self
                .hessians
                .iter()
                .flatten()
                .all(IntervalMatrix::is_finite)
            && self
                .third_order
                .iter()
                .flatten()
                .all(IntervalTensor3::is_finite)
    }
}

fn require<'a, T>(part: Option<&'a T>, what: &str) -> Result<&'a T> {
    part.ok_or_else(|| ReachError::Oracle(format!("oracle did not return the {what}")))
}

fn check_len(what: &str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        tracing::debug!("{} has length {}, expected {}", what, got, expected);
        Err(ReachError::shape_mismatch(vec![expected], vec![got]))
    }
}

fn check_dims(what: &str, expected: (usize, usize), got: (usize, usize)) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        tracing::debug!("{} has shape {:?}, expected {:?}", what, got, expected);
        Err(ReachError::shape_mismatch(
            vec![expected.0, expected.1],
            vec![got.0, got.1],
        ))
    }
}

fn check_cube(what: &str, vars: usize, got: (usize, usize, usize)) -> Result<()> {
    if got == (vars, vars, vars) {
        Ok(())
    } else {
        tracing::debug!("{} has shape {:?}, expected {}³", what, got, vars);
        Err(ReachError::shape_mismatch(
            vec![vars, vars, vars],
            vec![got.0, got.1, got.2],
        ))
    }
}

/// Capability interface the reachability algorithms evaluate dynamics through.
pub trait DynamicsOracle: Send + Sync {
    fn name(&self) -> &str;

    fn state_dim(&self) -> usize;

    fn input_dim(&self) -> usize;

    /// Highest derivative order this oracle can supply.
    fn max_order(&self) -> usize;

    fn supports(&self, order: usize) -> bool {
        order <= self.max_order()
    }

    fn evaluate(&self, x: &Array1<f64>, u: &Array1<f64>, order: usize) -> Result<Evaluation>;

    fn evaluate_enclosure(
        &self,
        x: &IntervalVector,
        u: &IntervalVector,
        order: usize,
    ) -> Result<IntervalEvaluation>;
}

impl<T: DynamicsOracle + ?Sized> DynamicsOracle for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn state_dim(&self) -> usize {
        (**self).state_dim()
    }

    fn input_dim(&self) -> usize {
        (**self).input_dim()
    }

    fn max_order(&self) -> usize {
        (**self).max_order()
    }

    fn evaluate(&self, x: &Array1<f64>, u: &Array1<f64>, order: usize) -> Result<Evaluation> {
        (**self).evaluate(x, u, order)
    }

    fn evaluate_enclosure(
        &self,
        x: &IntervalVector,
        u: &IntervalVector,
        order: usize,
    ) -> Result<IntervalEvaluation> {
        (**self).evaluate_enclosure(x, u, order)
    }
}

/// [`DynamicsOracle`] for a [`VectorField`], differentiated with [`Jet`]s.
#[derive(Debug, Clone)]
pub struct Model<F> {
    field: F,
    reversed: bool,
    name: String,
}

impl<F: VectorField> Model<F> {
    pub fn new(field: F) -> Self {
        let name = field.name().to_string();
        Self {
            field,
            reversed: false,
            name,
        }
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// The backward-time field `x' = −f(x, u)`.
    pub fn reversed(&self) -> Self
    where
        F: Clone,
    {
        let reversed = !self.reversed;
        Self {
            field: self.field.clone(),
            reversed,
            name: if reversed {
                format!("{} (reversed)", self.field.name())
            } else {
                self.field.name().to_string()
            },
        }
    }

    fn check_inputs(&self, x_len: usize, u_len: usize) -> Result<()> {
        check_len("state argument", self.field.state_dim(), x_len)?;
        check_len("input argument", self.field.input_dim(), u_len)
    }

    fn values<S: Scalar>(&self, x: &[S], u: &[S]) -> Vec<S> {
        let out = self.field.eval(x, u);
        if self.reversed {
            out.into_iter().map(|v| -v).collect()
        } else {
            out
        }
    }

    fn jets<S: Scalar>(&self, x: &[S], u: &[S], order: usize) -> Vec<Jet<S>> {
        let vars = x.len() + u.len();
        let variable = |v: &S, i: usize| {
            let jet = Jet::variable(v.clone(), i, vars);
            if order >= 3 {
                jet.with_third_order()
            } else {
                jet
            }
        };
        let xj: Vec<Jet<S>> = x.iter().enumerate().map(|(i, v)| variable(v, i)).collect();
        let uj: Vec<Jet<S>> = u
            .iter()
            .enumerate()
            .map(|(i, v)| variable(v, x.len() + i))
            .collect();
        self.values(&xj, &uj)
    }
}

impl<F: VectorField> DynamicsOracle for Model<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_dim(&self) -> usize {
        self.field.state_dim()
    }

    fn input_dim(&self) -> usize {
        self.field.input_dim()
    }

    fn max_order(&self) -> usize {
        3
    }

    fn evaluate(&self, x: &Array1<f64>, u: &Array1<f64>, order: usize) -> Result<Evaluation> {
        self.check_inputs(x.len(), u.len())?;
        let xs = x.to_vec();
        let us = u.to_vec();
        let n = self.state_dim();
        if order == 0 {
            let value = Array1::from(self.values(&xs, &us));
            check_len("field value", n, value.len())?;
            return Ok(Evaluation {
                value,
                jacobian: None,
                hessians: None,
                third_order: None,
            });
        }
        if order > self.max_order() {
            return Err(unsupported_order(order));
        }

        let jets = self.jets(&xs, &us, order);
        check_len("field value", n, jets.len())?;
        let vars = xs.len() + us.len();
        let value = jets.iter().map(|j| j.value).collect();
        let jacobian = Array2::from_shape_fn((n, vars), |(i, k)| jets[i].d(k));
        let hessians = (order >= 2).then(|| {
            jets.iter()
                .map(|j| Array2::from_shape_fn((vars, vars), |(a, b)| j.dd(a, b, vars)))
                .collect()
        });
        let third_order = (order >= 3).then(|| {
            jets.iter()
                .map(|j| {
                    Array3::from_shape_fn((vars, vars, vars), |(a, b, c)| j.ddd(a, b, c, vars))
                })
                .collect()
        });
        Ok(Evaluation {
            value,
            jacobian: Some(jacobian),
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
        self.check_inputs(x.len(), u.len())?;
        if order > self.max_order() {
            return Err(unsupported_order(order));
        }
        let xs = x.to_intervals();
        let us = u.to_intervals();
        let n = self.state_dim();
        if order == 0 {
            let value = self.values(&xs, &us);
            check_len("field enclosure", n, value.len())?;
            return Ok(IntervalEvaluation {
                value: IntervalVector::from_intervals(&value),
                jacobian: None,
                hessians: None,
                third_order: None,
            });
        }

        let jets = self.jets(&xs, &us, order);
        check_len("field enclosure", n, jets.len())?;
        let vars = xs.len() + us.len();
        let value: Vec<Interval> = jets.iter().map(|j| j.value).collect();
        let jacobian = interval_matrix((n, vars), |i, k| jets[i].d(k));
        let hessians = (order >= 2).then(|| {
            jets.iter()
                .map(|j| interval_matrix((vars, vars), |a, b| j.dd(a, b, vars)))
                .collect()
        });
        let third_order = (order >= 3).then(|| {
            jets.iter()
                .map(|j| {
                    let shape = (vars, vars, vars);
                    IntervalTensor3 {
                        lower: Array3::from_shape_fn(shape, |(a, b, c)| j.ddd(a, b, c, vars).lower),
                        upper: Array3::from_shape_fn(shape, |(a, b, c)| j.ddd(a, b, c, vars).upper),
                    }
                })
                .collect()
        });
        Ok(IntervalEvaluation {
            value: IntervalVector::from_intervals(&value),
            jacobian: Some(jacobian),
            hessians,
            third_order,
        })
    }
}

fn unsupported_order(order: usize) -> ReachError {
    ReachError::UnsupportedConfiguration(format!(
        "derivative order {order} (forward-mode jets provide up to 3)"
    ))
}

fn interval_matrix(
    shape: (usize, usize),
    entry: impl Fn(usize, usize) -> Interval,
) -> IntervalMatrix {
    let mut lower = Array2::zeros(shape);
    let mut upper = Array2::zeros(shape);
    for i in 0..shape.0 {
        for j in 0..shape.1 {
            let v = entry(i, j);
            lower[[i, j]] = v.lower;
            upper[[i, j]] = v.upper;
        }
    }
    IntervalMatrix { lower, upper }
}
