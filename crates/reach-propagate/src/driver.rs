//! Lock-step driver for multi-set runs.
//!
//! Every initial set gets its own [`SetPropagator`]. At each step the
//! driver advances all propagators (on the rayon pool when there are
//! enough of them), then appends the step's sets to the history. Stop
//! requests are honoured only between steps, so the history is always a
//! prefix of complete steps.

use crate::options::ReachOptions;
use crate::parallel::ParallelConfig;
use crate::result::{ReachFailure, ReachOutcome, ReachResult, Termination};
use rayon::prelude::*;
use reach_core::{ReachError, Result};
use reach_zonotope::Zonotope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sets produced by one step of one propagator.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSets {
    pub time_point: Zonotope,
    pub time_interval: Zonotope,
    /// Linearization-error iterations spent (0 for linear systems).
    pub error_iterations: usize,
}

/// One step of an algorithm, applied independently to each tracked set.
pub trait StepKernel: Sync {
    /// Per-set state carried from one step to the next.
    type Carry: Send;

    fn initial_carry(&self, r0: &Zonotope) -> Self::Carry;

    /// Sets reached from `current` during the next step.
    fn advance(&self, current: &Zonotope, carry: &mut Self::Carry) -> Result<StepSets>;
}

/// State machine propagating one initial set.
#[derive(Debug, Clone)]
pub struct SetPropagator<C> {
    index: usize,
    current: Zonotope,
    carry: C,
    steps: usize,
}

impl<C: Send> SetPropagator<C> {
    pub fn new<K: StepKernel<Carry = C>>(index: usize, r0: Zonotope, kernel: &K) -> Self {
        let carry = kernel.initial_carry(&r0);
        Self {
            index,
            current: r0,
            carry,
            steps: 0,
        }
    }

    /// Position of the initial set in `r0`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Latest time-point set.
    pub fn current(&self) -> &Zonotope {
        &self.current
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Advance by one step; the current set is unchanged on failure.
    pub fn advance<K: StepKernel<Carry = C>>(&mut self, kernel: &K) -> Result<StepSets> {
        let sets = kernel.advance(&self.current, &mut self.carry)?;
        for set in [&sets.time_point, &sets.time_interval] {
            if !set.is_finite() {
                return Err(ReachError::degenerate(
                    format!("reachable set of initial set {}", self.index),
                    set.max_abs(),
                ));
            }
        }
        self.current = sets.time_point.clone();
        self.steps += 1;
        Ok(sets)
    }
}

/// Caller-side controls that are not part of the analysis options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunControl<'a> {
    pub parallel: Option<&'a ParallelConfig>,
    /// Set to `true` to stop the run before its next step.
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> RunControl<'a> {
    pub fn with_parallel(mut self, parallel: &'a ParallelConfig) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn stop_reason(&self, options: &ReachOptions, start: Instant) -> Option<Termination> {
        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Some(Termination::Cancelled);
        }
        match options.timeout {
            Some(limit) if start.elapsed() >= limit => Some(Termination::TimedOut),
            _ => None,
        }
    }
}

/// Run `kernel` over the horizon from every initial set in `options.r0`.
///
/// `options` must already be validated.
pub fn run<K: StepKernel>(kernel: &K, options: &ReachOptions, control: &RunControl<'_>) -> ReachOutcome {
    let start = Instant::now();
    let steps = options.steps();
    let default_parallel = ParallelConfig::default();
    let parallel = control.parallel.unwrap_or(&default_parallel);
    let use_parallel = parallel.use_parallel(options.r0.len());
    let pool = if use_parallel {
        parallel.build_pool()?
    } else {
        None
    };

    info!(
        "Reachability run: {} initial sets, {} steps of {}, {}",
        options.r0.len(),
        steps,
        options.step,
        if use_parallel { "parallel" } else { "serial" }
    );

    let mut propagators: Vec<SetPropagator<K::Carry>> = options
        .r0
        .iter()
        .enumerate()
        .map(|(i, r0)| SetPropagator::new(i, r0.clone(), kernel))
        .collect();
    let mut result = ReachResult::empty(steps);

    for step in 0..steps {
        if let Some(reason) = control.stop_reason(options, start) {
            warn!(
                "Run stopped ({:?}) after {} of {} steps",
                reason, step, steps
            );
            result.termination = reason;
            break;
        }

        let outcomes: Vec<Result<StepSets>> = if use_parallel {
            ParallelConfig::install(pool.as_ref(), || {
                propagators
                    .par_iter_mut()
                    .map(|p| p.advance(kernel))
                    .collect()
            })
        } else {
            propagators.iter_mut().map(|p| p.advance(kernel)).collect()
        };

        let mut time_interval = Vec::with_capacity(outcomes.len());
        let mut time_point = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(sets) => {
                    result.stats.error_iterations += sets.error_iterations;
                    time_interval.push(sets.time_interval);
                    time_point.push(sets.time_point);
                }
                Err(e) => {
                    result.stats.wall_time_ms = start.elapsed().as_millis() as u64;
                    warn!("Step {} failed: {}", step, e);
                    return Err(ReachFailure::at(step, e, result));
                }
            }
        }
        debug!(
            "Step {}/{}: max generators {}, max width {:.3e}",
            step + 1,
            steps,
            time_interval
                .iter()
                .map(Zonotope::generator_count)
                .max()
                .unwrap_or(0),
            time_point
                .iter()
                .map(|z| z.interval_hull().max_width())
                .fold(0.0, f64::max)
        );
        result.push_step(time_interval, time_point);
    }

    result.stats.wall_time_ms = start.elapsed().as_millis() as u64;
    info!(
        "Reachability run complete: {} steps, {:?}, {}ms",
        result.len(),
        result.termination,
        result.stats.wall_time_ms
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    /// Shifts every set by one unit per step and counts steps in the carry.
    struct Shift {
        fail_at: Option<usize>,
    }

    impl StepKernel for Shift {
        type Carry = usize;

        fn initial_carry(&self, _r0: &Zonotope) -> usize {
            0
        }

        fn advance(&self, current: &Zonotope, carry: &mut usize) -> Result<StepSets> {
            if Some(*carry) == self.fail_at {
                return Err(ReachError::Oracle("injected".to_string()));
            }
            *carry += 1;
            let next = current.translate(&arr1(&[1.0]))?;
            Ok(StepSets {
                time_interval: current.enclose(&next)?,
                time_point: next,
                error_iterations: 1,
            })
        }
    }

    fn options(sets: usize) -> ReachOptions {
        let r0 = (0..sets)
            .map(|i| Zonotope::from_bounds(arr1(&[i as f64]), arr1(&[i as f64 + 0.5])).unwrap())
            .collect();
        ReachOptions::new(1.0, 0.25, r0, Zonotope::zero(1))
    }

    #[test]
    fn test_lock_step_history_shape() {
        let result = run(&Shift { fail_at: None }, &options(3), &RunControl::default()).unwrap();
        assert_eq!(result.len(), 4);
        assert!(result.time_point.iter().all(|step| step.len() == 3));
        assert_eq!(result.time_point[3][2].center()[0], 2.25 + 4.0);
        assert_eq!(result.stats.error_iterations, 12);
        assert!(result.is_complete());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let parallel = ParallelConfig {
            min_sets_for_parallel: 2,
            max_threads: Some(2),
        };
        let serial = ParallelConfig::serial();
        let a = run(
            &Shift { fail_at: None },
            &options(5),
            &RunControl::default().with_parallel(&parallel),
        )
        .unwrap();
        let b = run(
            &Shift { fail_at: None },
            &options(5),
            &RunControl::default().with_parallel(&serial),
        )
        .unwrap();
        assert_eq!(a.time_point, b.time_point);
        assert_eq!(a.time_interval, b.time_interval);
    }

    #[test]
    fn test_failure_keeps_partial_history() {
        let failure = run(&Shift { fail_at: Some(2) }, &options(2), &RunControl::default())
            .unwrap_err();
        assert_eq!(failure.step, Some(2));
        assert_eq!(failure.partial.len(), 2);
        assert_eq!(failure.source.step(), Some(2));
        assert!(matches!(failure.source.root(), ReachError::Oracle(_)));
    }

    #[test]
    fn test_cancelled_before_first_step() {
        let flag = AtomicBool::new(true);
        let result = run(
            &Shift { fail_at: None },
            &options(1),
            &RunControl::default().with_cancel(&flag),
        )
        .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.termination, Termination::Cancelled);
        assert_eq!(result.stats.planned_steps, 4);
    }

    #[test]
    fn test_zero_timeout_stops_immediately() {
        let opts = options(1).with_timeout(std::time::Duration::ZERO);
        let result = run(&Shift { fail_at: None }, &opts, &RunControl::default()).unwrap();
        assert_eq!(result.termination, Termination::TimedOut);
        assert!(result.is_empty());
    }

    #[test]
    fn test_propagator_tracks_current_set() {
        let kernel = Shift { fail_at: None };
        let r0 = Zonotope::from_bounds(arr1(&[0.0]), arr1(&[1.0])).unwrap();
        let mut p = SetPropagator::new(7, r0, &kernel);
        p.advance(&kernel).unwrap();
        p.advance(&kernel).unwrap();
        assert_eq!(p.index(), 7);
        assert_eq!(p.steps(), 2);
        assert_eq!(p.current().center()[0], 2.5);
    }
}
