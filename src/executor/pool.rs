//! Bounded worker pool and the sequential callback context.

use std::{
    cell::Cell,
    future::Future,
    num::NonZeroUsize,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    thread,
};

use tokio::{
    runtime::Handle,
    sync::{Semaphore, mpsc},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

thread_local! {
    static ON_CALLBACK_CONTEXT: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is running a callback right now.
pub(crate) fn on_callback_context() -> bool { ON_CALLBACK_CONTEXT.get() }

/// Worker count used when none is configured.
pub(crate) fn default_workers() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Caps the number of call chains running at once.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    permits: Arc<Semaphore>,
    size: NonZeroUsize,
}

impl WorkerPool {
    pub(crate) fn new(size: NonZeroUsize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.get())),
            size,
        }
    }

    pub(crate) fn size(&self) -> NonZeroUsize { self.size }

    /// Run `work` once a worker is free.
    ///
    /// Returns `None` if the pool was closed before a worker became free.
    pub(crate) async fn run<F: Future>(&self, work: F) -> Option<F::Output> {
        let _permit = self.permits.acquire().await.ok()?;
        Some(work.await)
    }

    pub(crate) fn close(&self) { self.permits.close(); }
}

type Callback = Box<dyn FnOnce() + Send>;

/// Runs result callbacks one at a time, in submission order, on a single task.
#[derive(Debug, Clone)]
pub(crate) struct CallbackContext {
    tx: mpsc::UnboundedSender<Callback>,
}

impl CallbackContext {
    pub(crate) fn start(handle: &Handle, tracker: &TaskTracker, shutdown: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Callback>();
        tracker.spawn_on(
            async move {
                loop {
                    tokio::select! {
                        biased;

                        () = shutdown.cancelled() => break,

                        next = rx.recv() => match next {
                            Some(callback) => run_callback(callback),
                            None => break,
                        },
                    }
                }
            },
            handle,
        );
        Self { tx }
    }

    /// Queue `callback`. Returns `false` once the context has stopped.
    pub(crate) fn post(&self, callback: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(callback)).is_ok()
    }
}

struct ContextGuard;

impl ContextGuard {
    fn enter() -> Self {
        ON_CALLBACK_CONTEXT.set(true);
        Self
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) { ON_CALLBACK_CONTEXT.set(false); }
}

fn run_callback(callback: Callback) {
    let _guard = ContextGuard::enter();
    if let Err(panic) = catch_unwind(AssertUnwindSafe(callback)) {
        let panic_msg = panic
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic>");
        tracing::error!(panic = %panic_msg, "result callback panicked");
    }
}
