use crate::{
    common::*,
    config::Limits,
    error::Result,
    map::{par_map, ArgSequences},
};

/// Handle to a pipeline running on a background thread.
///
/// Dropping the handle without joining detaches the pipeline; it keeps
/// running to completion and its callbacks keep firing.
#[derive(Debug)]
pub struct MapHandle {
    thread: thread::JoinHandle<()>,
}

impl MapHandle {
    /// Blocks until every result has been delivered and `on_done` has run.
    pub fn join(self) {
        if self.thread.join().is_err() {
            tracing::error!("async pipeline thread panicked in a callback");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Drives the full pipeline on a background thread, invoking `on_result` for
/// every ordered result and `on_done` once after exhaustion.
///
/// Argument validation happens synchronously: invalid limits or mismatched
/// sequence lengths fail here, before the background thread exists. Both
/// callbacks run on the background thread, never the caller's, so they may
/// freely use synchronization local to that thread.
///
/// ```rust
/// use par_map::par_map_async;
/// use std::sync::{
///     atomic::{AtomicU64, Ordering},
///     Arc,
/// };
///
/// let sum = Arc::new(AtomicU64::new(0));
/// let handle = par_map_async(
///     |x: u64| x * x,
///     (0..10u64,),
///     None,
///     {
///         let sum = sum.clone();
///         move |result| {
///             sum.fetch_add(result.unwrap(), Ordering::SeqCst);
///         }
///     },
///     || {},
/// )
/// .unwrap();
///
/// handle.join();
/// assert_eq!(sum.load(Ordering::SeqCst), 285);
/// ```
pub fn par_map_async<F, S, T, R, D>(
    f: F,
    sequences: S,
    limits: impl Into<Limits>,
    mut on_result: R,
    on_done: D,
) -> Result<MapHandle>
where
    S: ArgSequences,
    S::Args: Send + 'static,
    F: Fn(S::Args) -> T + Send + Sync + 'static,
    T: Send + 'static,
    R: FnMut(Result<T>) + Send + 'static,
    D: FnOnce() + Send + 'static,
{
    let results = par_map(f, sequences, limits)?;

    let thread = thread::Builder::new()
        .name("par-map-async".to_owned())
        .spawn(move || {
            for result in results {
                on_result(result);
            }
            on_done();
        })
        .expect("failed to spawn async facade thread");

    Ok(MapHandle { thread })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, InvalidArgument};
    use parking_lot::Mutex;

    #[test]
    fn callbacks_fire_in_order_then_done() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(AtomicBool::new(false));

        let handle = par_map_async(
            |x: u64| x + 1,
            (0..100u64,),
            None,
            {
                let collected = collected.clone();
                move |result: Result<u64>| collected.lock().push(result.unwrap())
            },
            {
                let done = done.clone();
                move || done.store(true, SeqCst)
            },
        )
        .unwrap();

        handle.join();
        assert!(done.load(SeqCst));
        itertools::assert_equal(collected.lock().iter().copied(), 1..=100);
    }

    #[test]
    fn invalid_arguments_fail_before_the_thread_exists() {
        let err = par_map_async(
            |x: u64| x,
            (0..4u64,),
            (Some(0), None),
            |_| {},
            || {},
        )
        .unwrap_err();
        assert_eq!(err, Error::InvalidArgument(InvalidArgument::ZeroThreadLimit));
    }

    #[test]
    fn task_failures_reach_the_result_callback() {
        let failures = Arc::new(Mutex::new(Vec::new()));

        let handle = par_map_async(
            |x: u64| {
                if x % 2 == 0 {
                    panic!("even input");
                }
                x
            },
            (0..6u64,),
            None,
            {
                let failures = failures.clone();
                move |result: Result<u64>| {
                    if let Err(Error::TaskFailure { index, .. }) = result {
                        failures.lock().push(index);
                    }
                }
            },
            || {},
        )
        .unwrap();

        handle.join();
        assert_eq!(*failures.lock(), vec![0, 2, 4]);
    }
}
