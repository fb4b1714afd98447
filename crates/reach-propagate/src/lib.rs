//! Reachable-set propagation for continuous-time systems.
//!
//! Two algorithms share one lock-step driver:
//! - [`LinearSystem`]: `x' = A·x + B·u + c`, propagated with a truncated
//!   Taylor series of `e^{A·dt}` plus an interval remainder
//!   ([`TaylorCache`]).
//! - [`Asb2008Cdc`]: nonlinear `x' = f(x, u)` given by a
//!   [`DynamicsOracle`], linearized at every step with a rigorous bound
//!   on the linearization error.
//!
//! Both return a [`ReachResult`] holding one time-interval and one
//! time-point set per step and per initial set. A failed run returns a
//! [`ReachFailure`] that keeps the steps computed before the failure.
//!
//! # Parallel runs
//!
//! Initial sets of one run (for example the pieces of a boundary
//! decomposition) are advanced concurrently within each step, and
//! independent runs can be swept with [`parallel::reach_many`].

pub mod driver;
pub mod dynamics;
pub mod expm;
pub mod linear;
pub mod models;
pub mod nonlinear;
pub mod options;
pub mod parallel;
pub mod result;
pub mod simulate;
pub mod taylor;

pub use driver::{RunControl, SetPropagator, StepKernel, StepSets};
pub use dynamics::{
    DynamicsOracle, Evaluation, IntervalEvaluation, IntervalTensor3, Jet, Model, VectorField,
};
pub use expm::expm;
pub use linear::{error_solution, LinearSystem, StepInputs};
pub use nonlinear::{Asb2008Cdc, NonlinearSystem};
pub use options::{ReachOptions, SUPPORTED_TENSOR_ORDERS};
pub use parallel::{reach_many, ParallelConfig};
pub use result::{ReachFailure, ReachOutcome, ReachResult, ReachStats, Termination};
pub use simulate::{simulate, Trajectory};
pub use taylor::{taylor_factors, ExponentialStage, TaylorCache};

// Re-export the layers below for tests and downstream use
pub use reach_core::{ReachError, Result};
pub use reach_interval::{Interval, IntervalMatrix, IntervalVector, Scalar};
pub use reach_zonotope::{boundary, HalfSpace, ReductionConfig, ReductionMethod, Zonotope};

#[cfg(test)]
mod tests;
