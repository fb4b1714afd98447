//! Benchmark vector fields.
//!
//! Every model takes one input. Models without an input term ignore it.

use crate::dynamics::{DynamicsOracle, Model, VectorField};
use reach_interval::Scalar;

fn c<S: Scalar>(v: f64) -> S {
    S::constant(v)
}

/// Van der Pol oscillator with additive input on the velocity.
#[derive(Debug, Clone, Copy, Default)]
pub struct VanDerPol;

impl VectorField for VanDerPol {
    fn name(&self) -> &str {
        "vanderpol"
    }

    fn state_dim(&self) -> usize {
        2
    }

    fn input_dim(&self) -> usize {
        1
    }

    fn eval<S: Scalar>(&self, x: &[S], u: &[S]) -> Vec<S> {
        vec![
            x[1].clone(),
            (c::<S>(1.0) - x[0].powi(2)) * x[1].clone() - x[0].clone() + u[0].clone(),
        ]
    }
}

/// Moore–Greitzer jet engine model.
#[derive(Debug, Clone, Copy, Default)]
pub struct JetEngine;

impl VectorField for JetEngine {
    fn name(&self) -> &str {
        "jet_engine"
    }

    fn state_dim(&self) -> usize {
        2
    }

    fn input_dim(&self) -> usize {
        1
    }

    fn eval<S: Scalar>(&self, x: &[S], _u: &[S]) -> Vec<S> {
        vec![
            -x[1].clone() - x[0].powi(2).scale(1.5) - x[0].powi(3).scale(0.5) - c(0.5),
            x[0].scale(3.0) - x[1].clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Brusselator;

impl VectorField for Brusselator {
    fn name(&self) -> &str {
        "brusselator"
    }

    fn state_dim(&self) -> usize {
        2
    }

    fn input_dim(&self) -> usize {
        1
    }

    fn eval<S: Scalar>(&self, x: &[S], _u: &[S]) -> Vec<S> {
        let x1_sq_x2 = x[0].powi(2) * x[1].clone();
        vec![
            c::<S>(1.0) + x1_sq_x2.clone() - x[0].scale(2.5),
            x[0].scale(1.5) - x1_sq_x2,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LotkaVolterra;

impl VectorField for LotkaVolterra {
    fn name(&self) -> &str {
        "lotka_volterra"
    }

    fn state_dim(&self) -> usize {
        2
    }

    fn input_dim(&self) -> usize {
        1
    }

    fn eval<S: Scalar>(&self, x: &[S], _u: &[S]) -> Vec<S> {
        let prey_predator = x[0].clone() * x[1].clone();
        vec![
            x[0].scale(1.5) - prey_predator.clone(),
            x[1].scale(-3.0) + prey_predator,
        ]
    }
}

/// Single-machine infinite-bus swing equation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynchronousMachine;

impl VectorField for SynchronousMachine {
    fn name(&self) -> &str {
        "synchronous_machine"
    }

    fn state_dim(&self) -> usize {
        2
    }

    fn input_dim(&self) -> usize {
        1
    }

    fn eval<S: Scalar>(&self, x: &[S], _u: &[S]) -> Vec<S> {
        vec![
            x[1].clone(),
            c::<S>(0.2) - x[0].sin().scale(0.7) - x[1].scale(0.05),
        ]
    }
}

/// Six cascaded water tanks with feedback from the last tank to the first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tank6;

impl Tank6 {
    const K: f64 = 0.015;
    const K2: f64 = 0.01;
    const G: f64 = 9.81;
}

impl VectorField for Tank6 {
    fn name(&self) -> &str {
        "tank6"
    }

    fn state_dim(&self) -> usize {
        6
    }

    fn input_dim(&self) -> usize {
        1
    }

    fn eval<S: Scalar>(&self, x: &[S], u: &[S]) -> Vec<S> {
        let outflow = Self::K * (2.0 * Self::G).sqrt();
        let roots: Vec<S> = x.iter().map(Scalar::sqrt).collect();
        let mut out = Vec::with_capacity(6);
        out.push(
            u[0].clone() + c(0.1) + (c::<S>(4.0) - x[5].clone()).scale(Self::K2)
                - roots[0].scale(outflow),
        );
        for i in 1..6 {
            out.push((roots[i - 1].clone() - roots[i].clone()).scale(outflow));
        }
        out
    }
}

/// Laub–Loomis enzymatic activity model.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaubLoomis;

impl VectorField for LaubLoomis {
    fn name(&self) -> &str {
        "laub_loomis"
    }

    fn state_dim(&self) -> usize {
        7
    }

    fn input_dim(&self) -> usize {
        1
    }

    fn eval<S: Scalar>(&self, x: &[S], _u: &[S]) -> Vec<S> {
        vec![
            x[2].scale(1.4) - x[0].scale(0.9),
            x[4].scale(2.5) - x[1].scale(1.5),
            x[6].scale(0.6) - (x[1].clone() * x[2].clone()).scale(0.8),
            c::<S>(2.0) - (x[2].clone() * x[3].clone()).scale(1.3),
            x[0].scale(0.7) - x[3].clone() * x[4].clone(),
            x[0].scale(0.3) - x[5].scale(3.1),
            x[5].scale(1.8) - (x[1].clone() * x[6].clone()).scale(1.5),
        ]
    }
}

/// Names accepted by [`by_name`].
pub const MODEL_NAMES: [&str; 7] = [
    "vanderpol",
    "jet_engine",
    "brusselator",
    "lotka_volterra",
    "synchronous_machine",
    "tank6",
    "laub_loomis",
];

/// Look up a built-in model.
pub fn by_name(name: &str) -> Option<Box<dyn DynamicsOracle>> {
    let model: Box<dyn DynamicsOracle> = match name {
        "vanderpol" => Box::new(Model::new(VanDerPol)),
        "jet_engine" => Box::new(Model::new(JetEngine)),
        "brusselator" => Box::new(Model::new(Brusselator)),
        "lotka_volterra" => Box::new(Model::new(LotkaVolterra)),
        "synchronous_machine" => Box::new(Model::new(SynchronousMachine)),
        "tank6" => Box::new(Model::new(Tank6)),
        "laub_loomis" => Box::new(Model::new(LaubLoomis)),
        _ => return None,
    };
    Some(model)
}
