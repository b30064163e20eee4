use crate::common::*;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(0);

/// Cancel tokens of every live pipeline session, keyed by session id.
static SESSIONS: Lazy<DashMap<u64, CancelToken>> = Lazy::new(DashMap::new);

/// Raises the cancel token of every live pipeline session.
///
/// Structured termination through [ParMap](crate::ParMap) ownership is the
/// primary cleanup path; this is the last-resort net for embedders that wire
/// their own exit or signal handling. Workers finish their in-flight task and
/// stop pulling new ones.
pub fn terminate_all() {
    for entry in SESSIONS.iter() {
        entry.value().cancel();
    }
}

/// Shared flag polled by workers and the distributor between tasks.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(SeqCst)
    }
}

/// Owned handle to one spawned worker.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    pub id: usize,
    pub alive: Arc<AtomicBool>,
    pub thread: thread::JoinHandle<()>,
}

impl WorkerHandle {
    /// A worker is alive from spawn until its thread body returns.
    pub fn is_alive(&self) -> bool {
        self.alive.load(SeqCst)
    }
}

/// Flips the paired alive flag when the worker body returns, unwinds included.
pub(crate) struct AliveGuard(pub Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, SeqCst);
    }
}

/// Tracks every execution unit of one pipeline session: worker handles, the
/// distributor handle, and the session's cancel token.
///
/// Dropping the set cancels the session and removes it from the registry
/// without blocking on user code; [terminate](WorkerSet::terminate) is the
/// blocking variant that also joins the workers.
#[derive(Debug)]
pub(crate) struct WorkerSet {
    session: u64,
    cancel: CancelToken,
    handles: Mutex<Vec<WorkerHandle>>,
    distributor: Mutex<Option<thread::JoinHandle<()>>>,
}

impl WorkerSet {
    pub fn new() -> Self {
        let session = NEXT_SESSION_ID.fetch_add(1, SeqCst);
        let cancel = CancelToken::new();
        SESSIONS.insert(session, cancel.clone());
        tracing::debug!(session, "pipeline session opened");

        Self {
            session,
            cancel,
            handles: Mutex::new(Vec::new()),
            distributor: Mutex::new(None),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn register_worker(&self, handle: WorkerHandle) {
        self.handles.lock().push(handle);
    }

    pub fn set_distributor(&self, handle: thread::JoinHandle<()>) {
        *self.distributor.lock() = Some(handle);
    }

    pub fn alive_count(&self) -> usize {
        self.handles.lock().iter().filter(|h| h.is_alive()).count()
    }

    /// Cancels the session and joins every worker and the distributor.
    ///
    /// In-flight tasks run to completion; queued tasks are discarded.
    pub fn terminate(&self) {
        self.cancel.cancel();

        let workers = mem::take(&mut *self.handles.lock());
        for WorkerHandle { id, thread, .. } in workers {
            if thread.join().is_err() {
                tracing::error!(worker = id, "worker thread panicked");
            }
        }

        if let Some(distributor) = self.distributor.lock().take() {
            let _ = distributor.join();
        }
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        self.cancel.cancel();
        SESSIONS.remove(&self.session);
        tracing::debug!(session = self.session, "pipeline session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_session_lifetime() {
        let set = WorkerSet::new();
        let session = set.session;
        let token = set.cancel_token();

        assert!(SESSIONS.contains_key(&session));
        assert!(!token.is_cancelled());

        drop(set);
        assert!(!SESSIONS.contains_key(&session));
        assert!(token.is_cancelled());
    }

    #[test]
    fn terminate_joins_workers_and_clears_liveness() {
        let set = WorkerSet::new();
        let token = set.cancel_token();

        for id in 0..3 {
            let alive = Arc::new(AtomicBool::new(true));
            let flag = alive.clone();
            let worker_token = token.clone();
            let thread = thread::spawn(move || {
                let _guard = AliveGuard(flag);
                while !worker_token.is_cancelled() {
                    thread::park_timeout(std::time::Duration::from_millis(1));
                }
            });
            set.register_worker(WorkerHandle { id, alive, thread });
        }

        assert_eq!(set.alive_count(), 3);
        set.terminate();
        assert_eq!(set.alive_count(), 0);
    }
}
