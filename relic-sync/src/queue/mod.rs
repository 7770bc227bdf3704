//! Priority work queue with bounded concurrency and per-task retry.
//!
//! [`TaskQueue`] runs heterogeneous tasks through a single [`TaskWorker`],
//! strictly highest priority first (ties broken by insertion order), with at
//! most `concurrency` task bodies in flight. The queue is deliberately
//! unfair: sync priorities encode `−start_block`, which keeps the working
//! set near the current checkpoint instead of scattered across the range.
//!
//! On worker failure the queue hands the error and the owned task back to
//! [`TaskWorker::on_error`], which re-enqueues at the same priority with
//! `retry = true`. Retries are unbounded at this layer; bounding the system
//! is an upstream concern.
//!
//! Shared state lives behind a fast mutex that is never held across an
//! `await`; task bodies run as spawned tokio tasks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{Result, SyncError};

// ═══════════════════════════════════════════════════════════════════════════════
// TASK WORKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Processes tasks popped from a [`TaskQueue`].
#[async_trait]
pub trait TaskWorker<T>: Send + Sync + 'static {
    /// Run one task. The queue handle allows workers to enqueue follow-up
    /// tasks and inspect queue state.
    async fn process(&self, task: &T, queue: &TaskQueue<T>) -> Result<()>;

    /// Handle a failed task. Receives the owned task back; the standard
    /// implementation logs and re-enqueues it at the same priority with
    /// `retry = true`.
    async fn on_error(&self, error: SyncError, task: T, queue: &TaskQueue<T>);
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUEUE
// ═══════════════════════════════════════════════════════════════════════════════

struct QueuedTask<T> {
    priority: i64,
    seq: u64,
    task: T,
}

impl<T> PartialEq for QueuedTask<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for QueuedTask<T> {}

impl<T> PartialOrd for QueuedTask<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueuedTask<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then earlier insertion.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState<T> {
    heap: BinaryHeap<QueuedTask<T>>,
    next_seq: u64,
    running: usize,
    started: bool,
    paused: bool,
}

struct QueueInner<T> {
    worker: Arc<dyn TaskWorker<T>>,
    concurrency: usize,
    state: Mutex<QueueState<T>>,
    idle: Notify,
}

/// Priority task queue. Cheap to clone; clones share the same queue.
pub struct TaskQueue<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TaskQueue")
            .field("queued", &state.heap.len())
            .field("running", &state.running)
            .field("started", &state.started)
            .field("paused", &state.paused)
            .finish()
    }
}

impl<T: Send + Sync + 'static> TaskQueue<T> {
    /// Create a queue over `worker` with the given parallelism.
    ///
    /// # Panics
    ///
    /// Panics if `concurrency` is zero.
    #[must_use]
    pub fn new(worker: Arc<dyn TaskWorker<T>>, concurrency: usize) -> Self {
        assert!(concurrency > 0, "queue concurrency must be non-zero");
        Self {
            inner: Arc::new(QueueInner {
                worker,
                concurrency,
                state: Mutex::new(QueueState {
                    heap: BinaryHeap::new(),
                    next_seq: 0,
                    running: 0,
                    started: false,
                    paused: false,
                }),
                idle: Notify::new(),
            }),
        }
    }

    /// Enqueue a task. Larger priorities run first; equal priorities run in
    /// insertion order. `retry` marks re-enqueued failures (logging only).
    pub fn add_task(&self, task: T, priority: i64, retry: bool) {
        {
            let mut state = self.inner.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(QueuedTask {
                priority,
                seq,
                task,
            });
            debug!(priority, retry, queued = state.heap.len(), "task enqueued");
        }
        self.inner.dispatch();
    }

    /// Start (or resume) processing.
    pub fn start(&self) {
        {
            let mut state = self.inner.state.lock();
            state.started = true;
            state.paused = false;
        }
        self.inner.dispatch();
        self.inner.notify_if_idle();
    }

    /// Stop popping new tasks; in-flight tasks finish normally.
    pub fn pause(&self) {
        self.inner.state.lock().paused = true;
    }

    /// Drop all queued tasks; in-flight tasks are unaffected.
    pub fn clear(&self) {
        self.inner.state.lock().heap.clear();
        self.inner.notify_if_idle();
    }

    /// Number of queued (not yet running) tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().heap.len()
    }

    /// Whether no tasks are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of currently running tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Whether the queue has started and has neither queued nor running
    /// tasks.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.started && state.running == 0 && state.heap.is_empty()
    }

    /// Wait until the queue is idle (started, nothing queued, nothing
    /// running).
    pub async fn on_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register for wakeups before checking, so a notification
            // between the check and the await is not lost.
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl<T: Send + Sync + 'static> QueueInner<T> {
    /// Pop and spawn tasks while capacity allows.
    fn dispatch(self: &Arc<Self>) {
        let mut state = self.state.lock();
        while state.started && !state.paused && state.running < self.concurrency {
            let Some(entry) = state.heap.pop() else { break };
            state.running += 1;
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                inner.run(entry).await;
            });
        }
    }

    async fn run(self: Arc<Self>, entry: QueuedTask<T>) {
        let queue = TaskQueue {
            inner: Arc::clone(&self),
        };
        if let Err(error) = self.worker.process(&entry.task, &queue).await {
            // The error handler owns the task again and may re-enqueue it.
            self.worker.on_error(error, entry.task, &queue).await;
        }
        self.state.lock().running -= 1;
        self.dispatch();
        self.notify_if_idle();
    }

    fn notify_if_idle(&self) {
        let idle = {
            let state = self.state.lock();
            state.started && state.running == 0 && state.heap.is_empty()
        };
        if idle {
            self.idle.notify_waiters();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records processed block starts; fails each listed start once.
    struct RecordingWorker {
        order: Arc<StdMutex<Vec<u64>>>,
        fail_once: Arc<StdMutex<Vec<u64>>>,
    }

    #[async_trait]
    impl TaskWorker<u64> for RecordingWorker {
        async fn process(&self, task: &u64, _queue: &TaskQueue<u64>) -> Result<()> {
            {
                let mut failures = self.fail_once.lock().unwrap();
                if let Some(position) = failures.iter().position(|start| start == task) {
                    failures.remove(position);
                    return Err(SyncError::Config("injected failure".into()));
                }
            }
            self.order.lock().unwrap().push(*task);
            Ok(())
        }

        async fn on_error(&self, _error: SyncError, task: u64, queue: &TaskQueue<u64>) {
            #[allow(clippy::cast_possible_wrap)]
            queue.add_task(task, -(task as i64), true);
        }
    }

    fn recording_queue(concurrency: usize) -> (TaskQueue<u64>, Arc<StdMutex<Vec<u64>>>) {
        let order = Arc::new(StdMutex::new(Vec::new()));
        let worker = RecordingWorker {
            order: Arc::clone(&order),
            fail_once: Arc::new(StdMutex::new(Vec::new())),
        };
        (TaskQueue::new(Arc::new(worker), concurrency), order)
    }

    #[tokio::test]
    async fn runs_in_priority_order_with_ties_by_insertion() {
        let (queue, order) = recording_queue(1);
        for start in [100_i64, 50, 200] {
            #[allow(clippy::cast_sign_loss)]
            queue.add_task(start as u64, -start, false);
        }
        queue.start();
        queue.on_idle().await;

        assert_eq!(*order.lock().unwrap(), vec![50, 100, 200]);
    }

    #[tokio::test]
    async fn tasks_added_before_start_do_not_run() {
        let (queue, order) = recording_queue(1);
        queue.add_task(1, -1, false);
        tokio::task::yield_now().await;
        assert!(order.lock().unwrap().is_empty());
        assert_eq!(queue.len(), 1);

        queue.start();
        queue.on_idle().await;
        assert_eq!(*order.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn failed_tasks_are_retried_at_same_priority() {
        let order = Arc::new(StdMutex::new(Vec::new()));
        let worker = RecordingWorker {
            order: Arc::clone(&order),
            fail_once: Arc::new(StdMutex::new(vec![50])),
        };
        let queue = TaskQueue::new(Arc::new(worker), 1);
        queue.add_task(50, -50, false);
        queue.add_task(100, -100, false);
        queue.start();
        queue.on_idle().await;

        // 50 failed once, was re-enqueued at priority -50, and still ran
        // before 100.
        assert_eq!(*order.lock().unwrap(), vec![50, 100]);
    }

    #[tokio::test]
    async fn clear_drops_queued_tasks() {
        let (queue, order) = recording_queue(1);
        queue.add_task(1, -1, false);
        queue.add_task(2, -2, false);
        queue.clear();
        queue.start();
        queue.on_idle().await;

        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn on_idle_resolves_for_empty_started_queue() {
        let (queue, _order) = recording_queue(4);
        queue.start();
        queue.on_idle().await;
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        use tokio::sync::Semaphore;

        struct CountingWorker {
            peak: Arc<StdMutex<usize>>,
            active: Arc<StdMutex<usize>>,
            gate: Arc<Semaphore>,
        }

        #[async_trait]
        impl TaskWorker<u64> for CountingWorker {
            async fn process(&self, _task: &u64, _queue: &TaskQueue<u64>) -> Result<()> {
                {
                    let mut active = self.active.lock().unwrap();
                    *active += 1;
                    let mut peak = self.peak.lock().unwrap();
                    *peak = (*peak).max(*active);
                }
                let _permit = self.gate.acquire().await;
                *self.active.lock().unwrap() -= 1;
                Ok(())
            }

            async fn on_error(&self, _error: SyncError, _task: u64, _queue: &TaskQueue<u64>) {}
        }

        let peak = Arc::new(StdMutex::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let worker = CountingWorker {
            peak: Arc::clone(&peak),
            active: Arc::new(StdMutex::new(0)),
            gate: Arc::clone(&gate),
        };
        let queue = TaskQueue::new(Arc::new(worker), 2);
        for task in 0..8_u64 {
            queue.add_task(task, 0, false);
        }
        queue.start();
        gate.add_permits(8);
        queue.on_idle().await;

        assert!(*peak.lock().unwrap() <= 2);
    }
}
