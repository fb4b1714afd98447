//! Forward-mode differentiation up to third order.
//!
//! A [`Jet`] carries a value with its gradient and Hessian with respect to
//! a fixed set of variables, and on request the third-derivative tensor.
//! Jets over `f64` give point derivatives; jets over
//! [`Interval`](reach_interval::Interval) give derivative enclosures over
//! a box. Constants carry empty derivative vectors, which stand for zero
//! of any length.

use reach_interval::Scalar;
use std::ops::{Add, Mul, Neg, Sub};

#[derive(Debug, Clone)]
pub struct Jet<S> {
    pub value: S,
    /// `∂value/∂vᵢ`; empty for constants.
    pub gradient: Vec<S>,
    /// Row-major `∂²value/∂vᵢ∂vⱼ`; empty when zero.
    pub hessian: Vec<S>,
    /// Row-major `∂³value/∂vᵢ∂vⱼ∂vₖ`; empty when zero or not tracked.
    pub third: Vec<S>,
    /// Whether `third` is propagated.
    tracks_third: bool,
}

fn add_parts<S: Scalar>(a: &[S], b: &[S]) -> Vec<S> {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_vec(),
        (_, true) => a.to_vec(),
        _ => a.iter().zip(b).map(|(x, y)| x.clone() + y.clone()).collect(),
    }
}

fn sub_parts<S: Scalar>(a: &[S], b: &[S]) -> Vec<S> {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.iter().map(|y| -y.clone()).collect(),
        (_, true) => a.to_vec(),
        _ => a.iter().zip(b).map(|(x, y)| x.clone() - y.clone()).collect(),
    }
}

fn scale_parts<S: Scalar>(a: &[S], s: &S) -> Vec<S> {
    a.iter().map(|x| x.clone() * s.clone()).collect()
}

/// `a ⊗ b`, row-major; empty if either side is.
fn outer<S: Scalar>(a: &[S], b: &[S]) -> Vec<S> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    a.iter()
        .flat_map(|x| b.iter().map(move |y| x.clone() * y.clone()))
        .collect()
}

/// `Tᵢⱼₖ = aᵢ·bⱼₖ + aⱼ·bᵢₖ + aₖ·bᵢⱼ` for a gradient `a` and a symmetric
/// row-major matrix `b`; empty if either side is.
fn spread<S: Scalar>(a: &[S], b: &[S]) -> Vec<S> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let n = a.len();
    let mut out = Vec::with_capacity(n * n * n);
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                out.push(
                    a[i].clone() * b[j * n + k].clone()
                        + a[j].clone() * b[i * n + k].clone()
                        + a[k].clone() * b[i * n + j].clone(),
                );
            }
        }
    }
    out
}

impl<S: Scalar> Jet<S> {
    pub fn constant(value: S) -> Self {
        Self {
            value,
            gradient: Vec::new(),
            hessian: Vec::new(),
            third: Vec::new(),
            tracks_third: false,
        }
    }

    /// The `index`-th of `count` independent variables.
    pub fn variable(value: S, index: usize, count: usize) -> Self {
        let gradient = (0..count)
            .map(|i| S::constant(if i == index { 1.0 } else { 0.0 }))
            .collect();
        Self {
            value,
            gradient,
            hessian: Vec::new(),
            third: Vec::new(),
            tracks_third: false,
        }
    }

    /// The same jet, propagating third derivatives through every
    /// operation it takes part in.
    pub fn with_third_order(mut self) -> Self {
        self.tracks_third = true;
        self
    }

    pub fn tracks_third(&self) -> bool {
        self.tracks_third
    }

    /// Gradient entry `i`, zero for constants.
    pub fn d(&self, i: usize) -> S {
        self.gradient
            .get(i)
            .cloned()
            .unwrap_or_else(|| S::constant(0.0))
    }

    /// Hessian entry `(i, j)` for `count` variables, zero when absent.
    pub fn dd(&self, i: usize, j: usize, count: usize) -> S {
        self.hessian
            .get(i * count + j)
            .cloned()
            .unwrap_or_else(|| S::constant(0.0))
    }

    /// Third-derivative entry `(i, j, k)` for `count` variables, zero
    /// when absent.
    pub fn ddd(&self, i: usize, j: usize, k: usize, count: usize) -> S {
        self.third
            .get((i * count + j) * count + k)
            .cloned()
            .unwrap_or_else(|| S::constant(0.0))
    }

    /// Compose with a scalar function given `φ(v)` and its first three
    /// derivatives at `v`. `f3` is only evaluated when third derivatives
    /// are tracked.
    fn chain(&self, f0: S, f1: S, f2: S, f3: impl FnOnce() -> S) -> Self {
        let gradient = scale_parts(&self.gradient, &f1);
        let hessian = add_parts(
            &scale_parts(&self.hessian, &f1),
            &scale_parts(&outer(&self.gradient, &self.gradient), &f2),
        );
        let third = if self.tracks_third {
            let cubed = outer(&outer(&self.gradient, &self.gradient), &self.gradient);
            add_parts(
                &add_parts(
                    &scale_parts(&self.third, &f1),
                    &scale_parts(&spread(&self.gradient, &self.hessian), &f2),
                ),
                &scale_parts(&cubed, &f3()),
            )
        } else {
            Vec::new()
        };
        Self {
            value: f0,
            gradient,
            hessian,
            third,
            tracks_third: self.tracks_third,
        }
    }
}

impl<S: Scalar> Add for Jet<S> {
    type Output = Jet<S>;

    fn add(self, rhs: Jet<S>) -> Jet<S> {
        Jet {
            value: self.value + rhs.value,
            gradient: add_parts(&self.gradient, &rhs.gradient),
            hessian: add_parts(&self.hessian, &rhs.hessian),
            third: add_parts(&self.third, &rhs.third),
            tracks_third: self.tracks_third || rhs.tracks_third,
        }
    }
}

impl<S: Scalar> Sub for Jet<S> {
    type Output = Jet<S>;

    fn sub(self, rhs: Jet<S>) -> Jet<S> {
        Jet {
            value: self.value - rhs.value,
            gradient: sub_parts(&self.gradient, &rhs.gradient),
            hessian: sub_parts(&self.hessian, &rhs.hessian),
            third: sub_parts(&self.third, &rhs.third),
            tracks_third: self.tracks_third || rhs.tracks_third,
        }
    }
}

impl<S: Scalar> Mul for Jet<S> {
    type Output = Jet<S>;

    fn mul(self, rhs: Jet<S>) -> Jet<S> {
        let gradient = add_parts(
            &scale_parts(&self.gradient, &rhs.value),
            &scale_parts(&rhs.gradient, &self.value),
        );
        let cross = add_parts(
            &outer(&self.gradient, &rhs.gradient),
            &outer(&rhs.gradient, &self.gradient),
        );
        let hessian = add_parts(
            &add_parts(
                &scale_parts(&self.hessian, &rhs.value),
                &scale_parts(&rhs.hessian, &self.value),
            ),
            &cross,
        );
        let tracks_third = self.tracks_third || rhs.tracks_third;
        let third = if tracks_third {
            add_parts(
                &add_parts(
                    &scale_parts(&self.third, &rhs.value),
                    &scale_parts(&rhs.third, &self.value),
                ),
                &add_parts(
                    &spread(&rhs.gradient, &self.hessian),
                    &spread(&self.gradient, &rhs.hessian),
                ),
            )
        } else {
            Vec::new()
        };
        Jet {
            value: self.value * rhs.value,
            gradient,
            hessian,
            third,
            tracks_third,
        }
    }
}

impl<S: Scalar> Neg for Jet<S> {
    type Output = Jet<S>;

    fn neg(self) -> Jet<S> {
        Jet {
            value: -self.value,
            gradient: self.gradient.into_iter().map(|x| -x).collect(),
            hessian: self.hessian.into_iter().map(|x| -x).collect(),
            third: self.third.into_iter().map(|x| -x).collect(),
            tracks_third: self.tracks_third,
        }
    }
}

impl<S: Scalar> Scalar for Jet<S> {
    fn constant(value: f64) -> Self {
        Jet::constant(S::constant(value))
    }

    fn sin(&self) -> Self {
        let (s, c) = (self.value.sin(), self.value.cos());
        self.chain(s.clone(), c.clone(), -s, || -c)
    }

    fn cos(&self) -> Self {
        let (s, c) = (self.value.sin(), self.value.cos());
        self.chain(c.clone(), -s.clone(), -c, || s)
    }

    fn exp(&self) -> Self {
        let e = self.value.exp();
        self.chain(e.clone(), e.clone(), e.clone(), || e)
    }

    fn sqrt(&self) -> Self {
        let root = self.value.sqrt();
        let r = root.recip();
        let r3 = r.clone() * r.clone() * r.clone();
        let r5 = r3.clone() * r.clone() * r.clone();
        self.chain(root, r.scale(0.5), r3.scale(-0.25), || r5.scale(0.375))
    }

    fn recip(&self) -> Self {
        let r = self.value.recip();
        let r2 = r.clone() * r.clone();
        let r3 = r2.clone() * r.clone();
        let r4 = r2.clone() * r2.clone();
        self.chain(r, -r2, r3.scale(2.0), || r4.scale(-6.0))
    }

    fn powi(&self, n: i32) -> Self {
        match n {
            0 => Jet::constant(S::constant(1.0)),
            1 => self.clone(),
            2 => self.chain(
                self.value.powi(2),
                self.value.scale(2.0),
                S::constant(2.0),
                || S::constant(0.0),
            ),
            n => self.chain(
                self.value.powi(n),
                self.value.powi(n - 1).scale(n as f64),
                self.value.powi(n - 2).scale((n * (n - 1)) as f64),
                || self.value.powi(n - 3).scale((n * (n - 1) * (n - 2)) as f64),
            ),
        }
    }

    fn scale(&self, factor: f64) -> Self {
        Jet {
            value: self.value.scale(factor),
            gradient: self.gradient.iter().map(|x| x.scale(factor)).collect(),
            hessian: self.hessian.iter().map(|x| x.scale(factor)).collect(),
            third: self.third.iter().map(|x| x.scale(factor)).collect(),
            tracks_third: self.tracks_third,
        }
    }
}
