//! Deferred Task Dispatcher
//!
//! Work that must not run on the caller's stack (eviction callbacks, the
//! purge after an oversized write) is queued here and executed later.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// A unit of deferred work.
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

// == Dispatcher ==
/// Sending half: schedules tasks without running them.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: UnboundedSender<DeferredTask>,
}

impl Dispatcher {
    /// Queues `task` to run after the current operation returns.
    ///
    /// If the queue has been dropped the task is discarded with a warning
    /// and `false` is returned.
    pub fn defer<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(task)).is_err() {
            warn!("Deferred task dropped: dispatcher queue is closed");
            return false;
        }
        true
    }
}

// == Task Queue ==
/// Receiving half: executes queued tasks.
#[derive(Debug)]
pub struct TaskQueue {
    rx: UnboundedReceiver<DeferredTask>,
}

impl TaskQueue {
    /// Runs every task queued so far on the current thread.
    ///
    /// Tasks queued by the tasks themselves are run too. Returns the number
    /// of tasks executed.
    pub fn run_pending(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            executed += 1;
        }
        executed
    }

    /// Receives tasks until every `Dispatcher` is dropped, running each on
    /// the blocking pool so tasks are unordered with respect to each other.
    ///
    /// Returns once the queue is closed and every received task has finished.
    pub async fn run(mut self) {
        let mut running = JoinSet::new();
        while let Some(task) = self.rx.recv().await {
            running.spawn_blocking(task);
            while let Some(finished) = running.try_join_next() {
                log_task_failure(finished);
            }
        }

        debug!("Dispatcher queue closed, waiting for {} tasks", running.len());
        while let Some(finished) = running.join_next().await {
            log_task_failure(finished);
        }
    }
}

fn log_task_failure(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        warn!("Deferred task failed: {}", err);
    }
}

/// Creates a connected dispatcher and task queue.
pub fn channel() -> (Dispatcher, TaskQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher { tx }, TaskQueue { rx })
}

/// Spawns a background task that drains `queue`.
///
/// # Returns
/// A JoinHandle that completes once every `Dispatcher` is dropped and the
/// queued work has run, so shutdown can await it.
///
/// # Example
/// ```ignore
/// let (dispatcher, queue) = tasks::channel();
/// let handle = spawn_dispatcher(queue);
/// // Later, during shutdown:
/// drop(dispatcher);
/// handle.await?;
/// ```
pub fn spawn_dispatcher(queue: TaskQueue) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting deferred task dispatcher");
        queue.run().await;
    })
}
