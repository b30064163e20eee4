use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by a pipeline run.
///
/// [InvalidArgument](Error::InvalidArgument) is returned synchronously before
/// any worker is spawned. The other variants are delivered through the ordered
/// output, in place of the results they displaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    /// The user function panicked while executing the task at `index`.
    ///
    /// Yielded at the position the task's result would have occupied. The
    /// remaining tasks are unaffected.
    #[error("task {index} panicked: {message}")]
    TaskFailure { index: usize, message: String },

    /// Every worker exited before the full result set was delivered.
    ///
    /// This is an infrastructure defect, not a task error. The output fuses
    /// after yielding it once.
    #[error("workers exited after delivering {delivered} of {total} results")]
    PipelineFailure { delivered: usize, total: usize },
}

/// Rejected input, detected before the worker grid exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidArgument {
    #[error("thread limit must be positive")]
    ZeroThreadLimit,

    #[error("worker limit must be positive")]
    ZeroWorkerLimit,

    #[error("argument sequences have mismatched lengths: {lengths:?}")]
    MismatchedLengths { lengths: Vec<usize> },
}
