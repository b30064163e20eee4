use crate::{
    common::*,
    lifecycle::CancelToken,
    task::{Message, Task},
};

/// Spawns the background thread that round-robins indexed tasks across the
/// per-worker queues, then terminates each queue with one sentinel.
///
/// Queue pushes block on bounded queues, so slow workers throttle enqueuing
/// instead of piling up memory. Distribution stops early if the cancel token
/// is raised or a queue disconnects; the remaining workers then observe their
/// queues closing instead of a sentinel.
pub(crate) fn spawn<A>(
    args: Vec<A>,
    queues: Vec<flume::Sender<Message<A>>>,
    cancel: CancelToken,
) -> thread::JoinHandle<()>
where
    A: Send + 'static,
{
    thread::Builder::new()
        .name("par-map-scatter".to_owned())
        .spawn(move || scatter(args, queues, cancel))
        .expect("failed to spawn distributor thread")
}

fn scatter<A>(args: Vec<A>, queues: Vec<flume::Sender<Message<A>>>, cancel: CancelToken) {
    for (index, args) in args.into_iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::debug!(sent = index, "distribution cancelled");
            return;
        }

        let queue = &queues[index % queues.len()];
        if queue.send(Message::Task(Task { index, args })).is_err() {
            tracing::debug!(sent = index, "worker queue closed during distribution");
            return;
        }
    }

    for queue in &queues {
        let _ = queue.send(Message::Done);
    }
    tracing::trace!("distribution complete");
}
