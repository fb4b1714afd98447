//! Analysis results.

use reach_core::ReachError;
use reach_interval::IntervalVector;
use reach_zonotope::Zonotope;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Reached `t_end`.
    Completed,
    /// Stopped by the caller's cancellation flag.
    Cancelled,
    /// Stopped because the configured timeout elapsed.
    TimedOut,
}

/// Run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReachStats {
    /// Steps completed (history length).
    pub steps: usize,
    /// Steps the horizon required.
    pub planned_steps: usize,
    /// Wall time in milliseconds.
    pub wall_time_ms: u64,
    /// Largest generator count of any stored set.
    pub max_generators: usize,
    /// Linearization-error iterations summed over all sets and steps.
    pub error_iterations: usize,
}

/// Reachable-set history, indexed `[step][initial_set]`.
///
/// Entry `k` holds the sets for `[k·dt, (k+1)·dt]` (time interval) and
/// at `(k+1)·dt` (time point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachResult {
    pub time_interval: Vec<Vec<Zonotope>>,
    pub time_point: Vec<Vec<Zonotope>>,
    pub stats: ReachStats,
    pub termination: Termination,
}

impl ReachResult {
    pub(crate) fn empty(planned_steps: usize) -> Self {
        Self {
            time_interval: Vec::new(),
            time_point: Vec::new(),
            stats: ReachStats {
                planned_steps,
                ..ReachStats::default()
            },
            termination: Termination::Completed,
        }
    }

    pub(crate) fn push_step(&mut self, time_interval: Vec<Zonotope>, time_point: Vec<Zonotope>) {
        let widest = time_interval
            .iter()
            .chain(time_point.iter())
            .map(Zonotope::generator_count)
            .max()
            .unwrap_or(0);
        self.stats.max_generators = self.stats.max_generators.max(widest);
        self.time_interval.push(time_interval);
        self.time_point.push(time_point);
        self.stats.steps = self.time_point.len();
    }

    /// Number of stored steps.
    pub fn len(&self) -> usize {
        self.time_point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_point.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }

    /// Time-point sets after the last stored step.
    pub fn final_sets(&self) -> Option<&[Zonotope]> {
        self.time_point.last().map(Vec::as_slice)
    }

    /// Box hull of all time-point sets of one step.
    pub fn time_point_hull(&self, step: usize) -> Option<IntervalVector> {
        hull_of(self.time_point.get(step)?)
    }

    /// Box hull of all time-interval sets of one step.
    pub fn time_interval_hull(&self, step: usize) -> Option<IntervalVector> {
        hull_of(self.time_interval.get(step)?)
    }
}

fn hull_of(sets: &[Zonotope]) -> Option<IntervalVector> {
    let mut iter = sets.iter().map(Zonotope::interval_hull);
    let first = iter.next()?;
    iter.try_fold(first, |acc, h| acc.hull(&h).ok())
}

/// A run that aborted, with the history computed before the failure.
#[derive(Debug, Clone)]
pub struct ReachFailure {
    /// Step that failed; `None` when the run was rejected before starting.
    pub step: Option<usize>,
    pub source: ReachError,
    pub partial: ReachResult,
}

impl ReachFailure {
    pub(crate) fn at(step: usize, source: ReachError, partial: ReachResult) -> Self {
        Self {
            step: Some(step),
            source: source.at_step(step),
            partial,
        }
    }

    /// The underlying error, step wrapper included.
    pub fn into_error(self) -> ReachError {
        self.source
    }
}

impl From<ReachError> for ReachFailure {
    fn from(source: ReachError) -> Self {
        Self {
            step: None,
            source,
            partial: ReachResult::empty(0),
        }
    }
}

impl fmt::Display for ReachFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(
                f,
                "reachability analysis aborted at step {step} after {} complete steps: {}",
                self.partial.len(),
                self.source.root()
            ),
            None => write!(f, "reachability analysis rejected: {}", self.source),
        }
    }
}

impl std::error::Error for ReachFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

pub type ReachOutcome = std::result::Result<ReachResult, ReachFailure>;
