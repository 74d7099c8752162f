//! Worker pools for running independent compile jobs.
//!
//! A task posted to a pool runs exactly once, on exactly one pool. The
//! returned [`Waitable`] is signalled after the task body has returned (or
//! unwound), never before.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// A unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Completion handle of a posted task.
#[derive(Clone, Debug, Default)]
pub struct Waitable {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Waitable {
    fn pending() -> Self {
        Self::default()
    }

    fn ready() -> Self {
        let waitable = Self::default();
        waitable.signal();
        waitable
    }

    fn done(&self) -> MutexGuard<'_, bool> {
        // A poisoned flag is still a valid flag.
        self.state.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn signal(&self) {
        *self.done() = true;
        self.state.1.notify_all();
    }

    /// Block until the task has run.
    pub fn wait(&self) {
        let mut done = self.done();
        while !*done {
            done = self.state.1.wait(done).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Whether the task has run, without blocking.
    pub fn is_ready(&self) -> bool {
        *self.done()
    }
}

/// Signals its waitable when dropped, so a task that unwinds still
/// completes.
struct SignalOnDrop(Waitable);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        self.0.signal();
    }
}

/// Wrap `task` so running it signals the returned handle.
fn signalling(task: Task) -> (Task, Waitable) {
    let waitable = Waitable::pending();
    let signal = waitable.clone();
    let wrapped: Task = Box::new(move || {
        let _guard = SignalOnDrop(signal);
        task();
    });
    (wrapped, waitable)
}

pub trait WorkerPool: Send + Sync {
    /// Schedule `task`; the handle reports its completion.
    fn post(&self, task: Task) -> Waitable;

    /// Whether posted tasks may run on another thread.
    fn is_async(&self) -> bool;
}

// ─── Implementations ───────────────────────────────────────────────

/// Runs every task on the caller's thread before `post` returns.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleThreadedPool;

impl WorkerPool for SingleThreadedPool {
    fn post(&self, task: Task) -> Waitable {
        tracing::trace!("running task inline");
        task();
        Waitable::ready()
    }

    fn is_async(&self) -> bool {
        false
    }
}

/// A dedicated rayon thread pool.
pub struct ThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool {
    /// `num_threads == 0` uses rayon's default (one per logical CPU).
    pub fn new(num_threads: usize) -> Result<Self, Diagnostic> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|index| format!("pls-worker-{}", index));
        if num_threads > 0 {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder.build().map_err(|e| {
            Diagnostic::error(
                format!("failed to build worker thread pool: {}", e),
                Span::dummy(),
            )
        })?;
        tracing::debug!(threads = pool.current_num_threads(), "worker pool started");
        Ok(Self { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl WorkerPool for ThreadPool {
    fn post(&self, task: Task) -> Waitable {
        let (task, waitable) = signalling(task);
        tracing::trace!("posting task to worker pool");
        self.pool.spawn(task);
        waitable
    }

    fn is_async(&self) -> bool {
        true
    }
}

/// Hands every task to a scheduler owned by the embedder.
pub struct DelegatePool {
    delegate: Box<dyn Fn(Task) + Send + Sync>,
}

impl DelegatePool {
    pub fn new(delegate: impl Fn(Task) + Send + Sync + 'static) -> Self {
        Self {
            delegate: Box::new(delegate),
        }
    }
}

impl WorkerPool for DelegatePool {
    fn post(&self, task: Task) -> Waitable {
        let (task, waitable) = signalling(task);
        tracing::trace!("delegating task");
        (self.delegate)(task);
        waitable
    }

    fn is_async(&self) -> bool {
        true
    }
}

/// One thread runs inline; any other count (0 = default) gets a thread pool.
pub fn create(num_threads: usize) -> Result<Arc<dyn WorkerPool>, Diagnostic> {
    if num_threads == 1 {
        return Ok(Arc::new(SingleThreadedPool));
    }
    Ok(Arc::new(ThreadPool::new(num_threads)?))
}
