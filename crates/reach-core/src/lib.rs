//! Core error types for reachable-set computation.
//!
//! Every crate in the workspace reports failures through [`ReachError`].
//! The variants follow the order in which an analysis can fail: a bad
//! configuration is rejected before any computation starts, while shape
//! and numeric problems are discovered inside a time step and are wrapped
//! in [`ReachError::StepFailed`] so the caller learns which step aborted.

use thiserror::Error;

/// Error types for reachability operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReachError {
    /// Invalid or missing option, or inconsistent dimensions between the
    /// system matrices, the initial sets and the input set.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A requested combination (linearization order, algorithm variant)
    /// that is not implemented.
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    /// Interval constructed with a lower bound above its upper bound.
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// Infinite or undefined values produced by an enclosure computation.
    #[error("Numeric degeneracy in {context} (norm {norm:e})")]
    NumericDegeneracy { context: String, norm: f64 },

    /// The dynamics oracle could not evaluate the vector field.
    #[error("Dynamics evaluation failed: {0}")]
    Oracle(String),

    #[error("Step {step} failed: {source}")]
    StepFailed {
        step: usize,
        #[source]
        source: Box<ReachError>,
    },
}

impl ReachError {
    /// Create a ShapeMismatch error, panicking if shapes are identical (bug indicator).
    #[track_caller]
    pub fn shape_mismatch(expected: Vec<usize>, got: Vec<usize>) -> Self {
        if expected == got {
            let loc = std::panic::Location::caller();
            panic!(
                "BUG at {}:{}:{}: ShapeMismatch created with identical shapes: {:?}",
                loc.file(),
                loc.line(),
                loc.column(),
                expected
            );
        }
        ReachError::ShapeMismatch { expected, got }
    }

    /// Build a NumericDegeneracy error.
    pub fn degenerate(context: impl Into<String>, norm: f64) -> Self {
        ReachError::NumericDegeneracy {
            context: context.into(),
            norm,
        }
    }

    /// Attach a step index. Errors that already carry one are left alone.
    pub fn at_step(self, step: usize) -> Self {
        match self {
            e @ ReachError::StepFailed { .. } => e,
            e => ReachError::StepFailed {
                step,
                source: Box::new(e),
            },
        }
    }

    /// Step index of the failure, if one was attached.
    pub fn step(&self) -> Option<usize> {
        match self {
            ReachError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The underlying error with any step wrapper removed.
    pub fn root(&self) -> &ReachError {
        match self {
            ReachError::StepFailed { source, .. } => source.root(),
            e => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReachError>;

/// Fail with a ShapeMismatch unless `got == expected`.
#[inline]
#[track_caller]
pub fn ensure_shape(expected: &[usize], got: &[usize]) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(ReachError::shape_mismatch(expected.to_vec(), got.to_vec()))
    }
}
