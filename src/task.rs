/// One indexed invocation of the user function. Immutable once enqueued;
/// indices are contiguous from 0 in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Task<A> {
    pub index: usize,
    pub args: A,
}

/// Wire format of a per-worker input queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Message<A> {
    Task(Task<A>),
    /// End-of-stream sentinel, sent exactly once per queue.
    Done,
}

/// Tagged outcome of one task, written exactly once to the shared result
/// channel. A failed outcome carries the captured panic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Envelope<T> {
    pub index: usize,
    pub outcome: Result<T, String>,
}
