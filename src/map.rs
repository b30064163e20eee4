use crate::{
    common::*,
    config::{Limits, SizingPlan},
    error::{InvalidArgument, Result},
    lifecycle::WorkerSet,
    reorder::ParMap,
    scatter, utils, worker,
};

/// A tuple of equal-length argument sequences, positionally zipped into one
/// argument value per task.
///
/// Implemented for tuples of one to four `IntoIterator`s. A single sequence
/// zips to its item type; larger tuples zip to tuples. Sequences are
/// materialized up front: the task count must be known before distribution
/// starts, so open-ended inputs are not supported.
pub trait ArgSequences {
    type Args;

    fn zip_args(self) -> Result<Vec<Self::Args>>;
}

impl<I1> ArgSequences for (I1,)
where
    I1: IntoIterator,
{
    type Args = I1::Item;

    fn zip_args(self) -> Result<Vec<Self::Args>> {
        Ok(self.0.into_iter().collect())
    }
}

impl<I1, I2> ArgSequences for (I1, I2)
where
    I1: IntoIterator,
    I2: IntoIterator,
{
    type Args = (I1::Item, I2::Item);

    fn zip_args(self) -> Result<Vec<Self::Args>> {
        let first: Vec<_> = self.0.into_iter().collect();
        let second: Vec<_> = self.1.into_iter().collect();
        check_lengths(&[first.len(), second.len()])?;
        Ok(first.into_iter().zip(second).collect())
    }
}

impl<I1, I2, I3> ArgSequences for (I1, I2, I3)
where
    I1: IntoIterator,
    I2: IntoIterator,
    I3: IntoIterator,
{
    type Args = (I1::Item, I2::Item, I3::Item);

    fn zip_args(self) -> Result<Vec<Self::Args>> {
        let first: Vec<_> = self.0.into_iter().collect();
        let second: Vec<_> = self.1.into_iter().collect();
        let third: Vec<_> = self.2.into_iter().collect();
        check_lengths(&[first.len(), second.len(), third.len()])?;
        Ok(first
            .into_iter()
            .zip(second)
            .zip(third)
            .map(|((a, b), c)| (a, b, c))
            .collect())
    }
}

impl<I1, I2, I3, I4> ArgSequences for (I1, I2, I3, I4)
where
    I1: IntoIterator,
    I2: IntoIterator,
    I3: IntoIterator,
    I4: IntoIterator,
{
    type Args = (I1::Item, I2::Item, I3::Item, I4::Item);

    fn zip_args(self) -> Result<Vec<Self::Args>> {
        let first: Vec<_> = self.0.into_iter().collect();
        let second: Vec<_> = self.1.into_iter().collect();
        let third: Vec<_> = self.2.into_iter().collect();
        let fourth: Vec<_> = self.3.into_iter().collect();
        check_lengths(&[first.len(), second.len(), third.len(), fourth.len()])?;
        Ok(first
            .into_iter()
            .zip(second)
            .zip(third)
            .zip(fourth)
            .map(|(((a, b), c), d)| (a, b, c, d))
            .collect())
    }
}

fn check_lengths(lengths: &[usize]) -> Result<()> {
    if lengths.windows(2).any(|pair| pair[0] != pair[1]) {
        return Err(InvalidArgument::MismatchedLengths {
            lengths: lengths.to_vec(),
        }
        .into());
    }
    Ok(())
}

/// Computes `f` over every zipped argument tuple on a two-level worker grid
/// and returns the results as an ordered, lazy iterator.
///
/// The grid is sized by [SizingPlan::compute] from the task count, the
/// `limits`, and the host parallelism: up to `plan.workers` isolated workers,
/// each running `plan.threads_per_worker` task threads, so CPU-bound tasks
/// spread across cores while blocking tasks overlap within each worker.
///
/// Tasks are distributed round-robin; completions arrive in any order and are
/// reassembled into input order before they reach the caller.
///
/// ```rust
/// use par_map::par_map;
///
/// let squares: Vec<u64> = par_map(|x: u64| x * x, (0..8u64,), None)
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(squares, vec![0, 1, 4, 9, 16, 25, 36, 49]);
/// ```
pub fn par_map<F, S, T>(f: F, sequences: S, limits: impl Into<Limits>) -> Result<ParMap<T>>
where
    S: ArgSequences,
    S::Args: Send + 'static,
    F: Fn(S::Args) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    let limits = limits.into();
    let args = sequences.zip_args()?;
    let total = args.len();
    let plan = SizingPlan::for_host(total, &limits)?;

    if total == 0 {
        // Nothing to spawn; the iterator is born exhausted.
        let (_, results) = utils::channel(Some(0));
        return Ok(ParMap {
            expected: 0,
            total: 0,
            fused: false,
            buffer: HashMap::new(),
            results,
            workers: None,
        });
    }

    tracing::debug!(
        tasks = total,
        workers = plan.workers,
        threads_per_worker = plan.threads_per_worker,
        "starting pipeline"
    );

    let f = Arc::new(f);
    let workers = WorkerSet::new();
    let cancel = workers.cancel_token();
    let (result_tx, result_rx) = utils::channel(None);

    let mut queues = Vec::with_capacity(plan.workers);
    for id in 0..plan.workers {
        let (task_tx, task_rx) = utils::channel(Some(plan.threads_per_worker * 2));
        queues.push(task_tx);
        workers.register_worker(worker::spawn(
            id,
            f.clone(),
            plan.threads_per_worker,
            task_rx,
            result_tx.clone(),
            cancel.clone(),
        ));
    }
    // Workers hold the only result senders; a disconnect means every worker
    // has exited.
    drop(result_tx);

    workers.set_distributor(scatter::spawn(args, queues, cancel));

    Ok(ParMap {
        expected: 0,
        total,
        fused: false,
        buffer: HashMap::new(),
        results: result_rx,
        workers: Some(workers),
    })
}
