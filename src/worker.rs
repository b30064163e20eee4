use crate::{
    common::*,
    lifecycle::{AliveGuard, CancelToken, WorkerHandle},
    task::{Envelope, Message, Task},
    utils,
};

/// Spawns one worker: a dedicated thread owning a bounded pool of
/// `threads_per_worker` scoped threads.
///
/// The worker drains its input queue until it sees the sentinel, the queue
/// disconnects, or the cancel token is raised. In-flight submissions always
/// drain before the worker exits; the scope joins the pool even if a pool
/// thread unwinds.
pub(crate) fn spawn<A, T, F>(
    id: usize,
    f: Arc<F>,
    threads_per_worker: usize,
    input: flume::Receiver<Message<A>>,
    results: flume::Sender<Envelope<T>>,
    cancel: CancelToken,
) -> WorkerHandle
where
    A: Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> T + Send + Sync + 'static,
{
    let alive = Arc::new(AtomicBool::new(true));
    let flag = alive.clone();

    let thread = thread::Builder::new()
        .name(format!("par-map-worker-{}", id))
        .spawn(move || {
            let _guard = AliveGuard(flag);
            run(id, &*f, threads_per_worker, input, results, cancel);
        })
        .expect("failed to spawn worker thread");

    WorkerHandle { id, alive, thread }
}

fn run<A, T, F>(
    id: usize,
    f: &F,
    threads_per_worker: usize,
    input: flume::Receiver<Message<A>>,
    results: flume::Sender<Envelope<T>>,
    cancel: CancelToken,
) where
    A: Send,
    T: Send,
    F: Fn(A) -> T + Sync,
{
    tracing::debug!(worker = id, threads = threads_per_worker, "worker started");

    // Rendezvous channel: at most `threads_per_worker` tasks in flight, and
    // the feeder blocks whenever the pool is saturated.
    let (job_tx, job_rx) = utils::channel::<Task<A>>(Some(0));

    let outcome = crossbeam::thread::scope(|scope| {
        for _ in 0..threads_per_worker {
            let job_rx = job_rx.clone();
            let results = results.clone();

            scope.spawn(move |_| {
                for Task { index, args } in job_rx.iter() {
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| f(args))).map_err(panic_message);
                    if results.send(Envelope { index, outcome }).is_err() {
                        // The consumer hung up; the session is over.
                        break;
                    }
                }
            });
        }
        drop(job_rx);

        for message in input.iter() {
            match message {
                Message::Task(task) => {
                    if cancel.is_cancelled() || job_tx.send(task).is_err() {
                        break;
                    }
                }
                Message::Done => break,
            }
        }

        // Disconnecting the job channel lets in-flight submissions drain
        // before the scope joins the pool.
        drop(job_tx);
    });

    if outcome.is_err() {
        tracing::error!(worker = id, "worker pool thread panicked");
    }
    tracing::debug!(worker = id, "worker exited");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "task panicked with a non-string payload".to_owned(),
        },
    }
}
