use crate::{
    common::*,
    error::{InvalidArgument, Result},
};

/// Optional caps on the worker grid.
///
/// `threads` bounds the total number of task threads across all workers;
/// `workers` bounds the number of parallel workers. The entry points accept
/// anything convertible into `Limits`:
///
/// - `None`: no caps, the grid is sized from the host parallelism.
/// - `10` or any `usize`: total thread cap of 10.
/// - `(10, 4)`: thread cap 10, worker cap 4.
/// - `(Some(10), None)`: explicit optional pair.
///
/// A cap of zero is rejected with [InvalidArgument] before any worker spawns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limits {
    pub threads: Option<usize>,
    pub workers: Option<usize>,
}

impl From<Option<usize>> for Limits {
    fn from(threads: Option<usize>) -> Self {
        Self {
            threads,
            workers: None,
        }
    }
}

impl From<usize> for Limits {
    fn from(threads: usize) -> Self {
        Self {
            threads: Some(threads),
            workers: None,
        }
    }
}

impl From<(usize, usize)> for Limits {
    fn from((threads, workers): (usize, usize)) -> Self {
        Self {
            threads: Some(threads),
            workers: Some(workers),
        }
    }
}

impl From<(Option<usize>, Option<usize>)> for Limits {
    fn from((threads, workers): (Option<usize>, Option<usize>)) -> Self {
        Self { threads, workers }
    }
}

/// The worker grid computed for one invocation: `workers` parallel workers,
/// each running a pool of `threads_per_worker` threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingPlan {
    pub workers: usize,
    pub threads_per_worker: usize,
}

impl SizingPlan {
    /// Sizes the grid for `task_count` tasks under the given limits.
    ///
    /// Pure and deterministic; `available_parallelism` is injected so callers
    /// control the host probe. Workers never exceed the task count, the total
    /// thread budget, or `available_parallelism`; both plan fields are at
    /// least 1.
    pub fn compute(
        task_count: usize,
        limits: &Limits,
        available_parallelism: usize,
    ) -> Result<Self> {
        if limits.threads == Some(0) {
            return Err(InvalidArgument::ZeroThreadLimit.into());
        }
        if limits.workers == Some(0) {
            return Err(InvalidArgument::ZeroWorkerLimit.into());
        }

        let mut workers = cmp::max(cmp::min(available_parallelism, task_count), 1);
        if let Some(cap) = limits.workers {
            workers = cmp::min(workers, cap);
        }

        // Never spawn more workers than the total thread budget allows.
        if let Some(threads) = limits.threads {
            if threads < workers {
                return Ok(Self {
                    workers: threads,
                    threads_per_worker: 1,
                });
            }
        }

        let mut threads_per_worker = cmp::max(ceil_div(task_count, workers), 1);
        if let Some(threads) = limits.threads {
            threads_per_worker = cmp::max(
                cmp::min(threads_per_worker, ceil_div(threads, workers)),
                1,
            );
        }

        Ok(Self {
            workers,
            threads_per_worker,
        })
    }

    pub(crate) fn for_host(task_count: usize, limits: &Limits) -> Result<Self> {
        Self::compute(task_count, limits, num_cpus::get())
    }
}

fn ceil_div(numerator: usize, denominator: usize) -> usize {
    (numerator + denominator - 1) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn scarce_tasks_get_one_thread_per_worker() {
        let plan = SizingPlan::compute(3, &Limits::default(), 8).unwrap();
        assert_eq!(
            plan,
            SizingPlan {
                workers: 3,
                threads_per_worker: 1
            }
        );
    }

    #[test]
    fn thread_and_worker_caps_apply() {
        let plan = SizingPlan::compute(100, &(10, 4).into(), 8).unwrap();
        assert_eq!(plan.workers, 4);
        assert!(plan.threads_per_worker >= 1);
        // ceil(10 / 4)
        assert_eq!(plan.threads_per_worker, 3);
    }

    #[test]
    fn thread_budget_below_worker_count_shrinks_workers() {
        let plan = SizingPlan::compute(100, &2.into(), 8).unwrap();
        assert_eq!(
            plan,
            SizingPlan {
                workers: 2,
                threads_per_worker: 1
            }
        );
    }

    #[test]
    fn unlimited_grid_splits_tasks_evenly() {
        let plan = SizingPlan::compute(100, &Limits::default(), 8).unwrap();
        assert_eq!(plan.workers, 8);
        assert_eq!(plan.threads_per_worker, 13);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = SizingPlan::compute(10, &0.into(), 8).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidArgument(InvalidArgument::ZeroThreadLimit)
        );

        let err = SizingPlan::compute(10, &(1, 0).into(), 8).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidArgument(InvalidArgument::ZeroWorkerLimit)
        );
    }

    #[test]
    fn plan_is_pure() {
        let limits = Limits::from((16, 3));
        let first = SizingPlan::compute(1000, &limits, 12).unwrap();
        let second = SizingPlan::compute(1000, &limits, 12).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_still_produces_a_valid_grid() {
        let plan = SizingPlan::compute(0, &Limits::default(), 8).unwrap();
        assert!(plan.workers >= 1);
        assert!(plan.threads_per_worker >= 1);
    }

    #[test]
    fn limit_conversions() {
        assert_eq!(Limits::from(None), Limits::default());
        assert_eq!(
            Limits::from(7),
            Limits {
                threads: Some(7),
                workers: None
            }
        );
        assert_eq!(
            Limits::from((7, 2)),
            Limits {
                threads: Some(7),
                workers: Some(2)
            }
        );
        assert_eq!(
            Limits::from((None, Some(2))),
            Limits {
                threads: None,
                workers: Some(2)
            }
        );
    }
}
