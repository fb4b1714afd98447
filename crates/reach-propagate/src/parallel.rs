//! Worker-pool configuration and parallel parameter sweeps.
//!
//! Parallelism exists at two levels. Within one run, the sets tracked in
//! lock-step (for example the pieces of a boundary decomposition) are
//! advanced concurrently at every step. Across runs, [`reach_many`]
//! executes independent analyses concurrently. Steps of one set are
//! always sequential.
//!
//! # Example
//! ```ignore
//! use reach_propagate::parallel::{reach_many, ParallelConfig};
//!
//! let outcomes = reach_many(&option_grid, &ParallelConfig::default(), |options| {
//!     system.reach(options)
//! })?;
//! ```

use crate::result::ReachOutcome;
use rayon::prelude::*;
use rayon::ThreadPool;
use reach_core::{ReachError, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Configuration for parallel execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Minimum number of sets (or runs) before enabling parallelism.
    /// Below this threshold, serial execution is used to avoid overhead.
    pub min_sets_for_parallel: usize,

    /// Maximum number of threads to use.
    /// None means use rayon's default (typically number of cores).
    pub max_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            min_sets_for_parallel: 4,
            max_threads: None,
        }
    }
}

impl ParallelConfig {
    /// Never parallelize.
    pub fn serial() -> Self {
        Self {
            min_sets_for_parallel: usize::MAX,
            max_threads: None,
        }
    }

    pub(crate) fn use_parallel(&self, count: usize) -> bool {
        count >= self.min_sets_for_parallel.max(2)
    }

    /// Dedicated pool when a thread limit is configured.
    pub(crate) fn build_pool(&self) -> Result<Option<ThreadPool>> {
        match self.max_threads {
            Some(0) => Err(ReachError::Configuration(
                "max_threads must be at least 1".to_string(),
            )),
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map(Some)
                .map_err(|e| {
                    ReachError::Configuration(format!("Failed to create thread pool: {}", e))
                }),
            None => Ok(None),
        }
    }

    /// Run `op` inside the configured pool, or the global one.
    pub(crate) fn install<R: Send>(
        pool: Option<&ThreadPool>,
        op: impl FnOnce() -> R + Send,
    ) -> R {
        match pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

/// Run independent analyses, one per job, returning outcomes in job order.
///
/// Each run owns its own Taylor caches; nothing is shared between jobs.
/// A failed run does not affect the others.
pub fn reach_many<J, F>(jobs: &[J], config: &ParallelConfig, run: F) -> Result<Vec<ReachOutcome>>
where
    J: Sync,
    F: Fn(&J) -> ReachOutcome + Sync + Send,
{
    let start = Instant::now();
    info!("Parameter sweep: {} runs", jobs.len());

    let outcomes: Vec<ReachOutcome> = if config.use_parallel(jobs.len()) {
        let pool = config.build_pool()?;
        ParallelConfig::install(pool.as_ref(), || jobs.par_iter().map(&run).collect())
    } else {
        debug!(
            "Using serial sweep ({} runs < threshold {})",
            jobs.len(),
            config.min_sets_for_parallel
        );
        jobs.iter().map(&run).collect()
    };

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    info!(
        "Parameter sweep complete: {} runs, {} failed, {}ms",
        outcomes.len(),
        failed,
        start.elapsed().as_millis()
    );
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ReachFailure, ReachResult};

    #[test]
    fn test_default_config() {
        let config = ParallelConfig::default();
        assert_eq!(config.min_sets_for_parallel, 4);
        assert!(config.max_threads.is_none());
        assert!(config.use_parallel(4));
        assert!(!config.use_parallel(3));
        assert!(!ParallelConfig::serial().use_parallel(1000));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = ParallelConfig {
            min_sets_for_parallel: 1,
            max_threads: Some(0),
        };
        assert!(config.build_pool().is_err());
    }

    #[test]
    fn test_reach_many_preserves_order() {
        let jobs: Vec<usize> = (0..8).collect();
        let config = ParallelConfig {
            min_sets_for_parallel: 2,
            max_threads: Some(2),
        };
        let outcomes = reach_many(&jobs, &config, |&k| {
            if k == 5 {
                Err(ReachFailure::from(ReachError::Configuration("bad job".to_string())))
            } else {
                Ok(ReachResult::empty(k))
            }
        })
        .unwrap();
        assert_eq!(outcomes.len(), 8);
        for (k, outcome) in outcomes.iter().enumerate() {
            match outcome {
                Ok(r) => assert_eq!(r.stats.planned_steps, k),
                Err(f) => {
                    assert_eq!(k, 5);
                    assert_eq!(f.step, None);
                }
            }
        }
    }
}
