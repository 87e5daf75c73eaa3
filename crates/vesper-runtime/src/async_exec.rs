//! A small worker pool backing emitted `async`/`await` surface syntax.
//!
//! The toolkit does not bring in a full async runtime: the teacher crate has
//! none in its dependency stack, and a scripting language that only needs to
//! offload blocking host calls doesn't need one either. `async_execute`
//! spawns the closure onto a bounded pool of OS threads and hands back a
//! [`TaskHandle`] that blocks on `join` the way a oneshot future would.

use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::capability::{CapabilityManager, ContextId};

/// Raised by [`TaskHandle::join_timeout`] when a task doesn't finish in
/// time. Cancellation is cooperative-only: the job itself is never
/// interrupted, it is simply abandoned — its result, once it eventually
/// lands in `result`, is discarded rather than delivered.
#[derive(Debug, Clone, thiserror::Error)]
#[error("task did not complete within {0:?}")]
pub struct Timeout(pub Duration);

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Pool {
    sender: Sender<Job>,
}

fn pool(worker_count: usize) -> &'static Pool {
    static POOL: OnceLock<Pool> = OnceLock::new();
    POOL.get_or_init(|| {
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = bounded(1024);
        for _ in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            thread::spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            });
        }
        Pool { sender }
    })
}

/// A handle to a task submitted through [`async_execute`].
///
/// Polling isn't modeled; `join` blocks the calling thread until the task's
/// closure has run to completion, which is sufficient for the
/// transpiler's `await` desugaring (`await expr` lowers to `expr.join()`).
pub struct TaskHandle<T> {
    result: Arc<Mutex<Option<thread::Result<T>>>>,
    done: Receiver<()>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task completes and returns its result, or panics
    /// with the task's own panic payload if it panicked.
    pub fn join(self) -> T {
        let _ = self.done.recv();
        match self
            .result
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .expect("task completed but produced no result")
        {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Blocks until the task completes or `timeout` elapses, whichever
    /// comes first. On timeout the task is abandoned: its worker thread
    /// keeps running the closure to completion, but the result is dropped
    /// rather than returned to anyone, since nothing is left holding this
    /// handle's `done` receiver once this call returns `Err`.
    pub fn join_timeout(self, timeout: Duration) -> Result<T, Timeout> {
        match self.done.recv_timeout(timeout) {
            Ok(()) => match self
                .result
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
                .expect("task completed but produced no result")
            {
                Ok(value) => Ok(value),
                Err(payload) => std::panic::resume_unwind(payload),
            },
            Err(_) => Err(Timeout(timeout)),
        }
    }
}

/// Number of worker threads in the shared pool. A fixed size keeps resource
/// usage predictable for scripts that fan out many small tasks; it does not
/// scale with host core count because the pool backs I/O-bound bridge calls,
/// not CPU-bound work.
const DEFAULT_WORKERS: usize = 4;

/// Submits `job` to the shared worker pool under a capability context that
/// is a `Task` child of the caller's currently active context, and returns a
/// handle to await its result.
///
/// # Errors
/// Returns `Err` immediately, without spawning, if the calling thread has no
/// active capability context to propagate.
pub fn async_execute<T, F>(job: F) -> Result<TaskHandle<T>, crate::capability::CapabilityError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let parent = CapabilityManager::current()
        .ok_or(crate::capability::CapabilityError::NoActiveContext)?
        .id();
    Ok(spawn_with_parent(parent, job))
}

fn spawn_with_parent<T, F>(parent: ContextId, job: F) -> TaskHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let result: Arc<Mutex<Option<thread::Result<T>>>> = Arc::new(Mutex::new(None));
    let (done_tx, done_rx) = bounded(1);
    let task_ctx = CapabilityManager::propagate_to_task(parent);

    let result_slot = Arc::clone(&result);
    let boxed: Job = Box::new(move || {
        let _guard = task_ctx.map(CapabilityManager::activate);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job));
        *result_slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
        let _ = done_tx.send(());
    });

    pool(DEFAULT_WORKERS).sender.send(boxed).expect("worker pool is alive for the process lifetime");

    TaskHandle { result, done: done_rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityToken, ExecutionKind};

    #[test]
    fn task_runs_and_joins() {
        let root = CapabilityManager::create_context(ExecutionKind::Main, None, vec![]);
        let _guard = CapabilityManager::activate(root);
        let handle = async_execute(|| 2 + 2).expect("active context");
        assert_eq!(handle.join(), 4);
    }

    #[test]
    fn join_timeout_returns_err_when_task_is_slow() {
        let root = CapabilityManager::create_context(ExecutionKind::Main, None, vec![]);
        let _guard = CapabilityManager::activate(root);
        let handle = async_execute(|| {
            thread::sleep(Duration::from_millis(200));
            1
        })
        .expect("active context");
        assert!(matches!(handle.join_timeout(Duration::from_millis(10)), Err(Timeout(_))));
    }

    #[test]
    fn join_timeout_returns_ok_when_task_is_fast() {
        let root = CapabilityManager::create_context(ExecutionKind::Main, None, vec![]);
        let _guard = CapabilityManager::activate(root);
        let handle = async_execute(|| 2 + 2).expect("active context");
        assert_eq!(handle.join_timeout(Duration::from_secs(1)).unwrap(), 4);
    }

    #[test]
    fn task_inherits_capability_tokens() {
        let root = CapabilityManager::create_context(
            ExecutionKind::Main,
            None,
            vec![CapabilityToken::new("fs.read", &["/data/**"])],
        );
        let _guard = CapabilityManager::activate(root);
        let handle = async_execute(|| CapabilityManager::use_capability("fs.read", "/data/x").is_ok())
            .expect("active context");
        assert!(handle.join());
    }
}
