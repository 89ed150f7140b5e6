//! Embedded worker pool.
//!
//! A fixed-size pool of worker threads used by the manager's parallel query
//! dispatch, and usable directly for independent task bursts.
//!
//! ## Execution model
//! The pool is **not** a persistent executor. Tasks accumulate in a
//! mutex-guarded FIFO via [`WorkerPool::queue_task`]; each call to
//! [`WorkerPool::start`] spawns a fresh *cohort* of `max_threads` workers
//! that pull tasks until they observe an empty queue, then unwind and exit.
//! Callers wanting repeated parallel passes call `start` again.
//!
//! Spawning a fresh cohort per `start` (rather than keeping one persistent
//! worker set) lets a task running on a worker thread queue further tasks
//! and start its own cohort without deadlocking on the outer cohort's
//! capacity — nested parallel queries rely on this.
//!
//! Cohorts whose workers have all exited are garbage-collected lazily from
//! the head of the cohort deque on the next `start` call.
//!
//! ## Degraded mode
//! With `max_threads < 2` no threads are ever spawned; `start` drains the
//! queue synchronously on the calling thread.
//!
//! ## Contract
//! Tasks must be independent: there is no ordering beyond FIFO pickup, no
//! fairness, and no preemption. Sharing between tasks is the caller's
//! responsibility.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::profiling::profiler;

/// A queued unit of work.
pub type PoolTask = Box<dyn FnOnce() + Send + 'static>;

const POLL_INTERVAL: Duration = Duration::from_micros(30);

/// Bookkeeping for one `start` call: the number of its workers that are
/// still registered (spawned and not yet exited).
pub(crate) struct Cohort {
    registered: AtomicUsize,
}

impl Cohort {
    pub(crate) fn is_drained(&self) -> bool {
        self.registered.load(Ordering::Acquire) == 0
    }
}

/// Unregisters a worker from its cohort on scope exit, panics included.
struct Unregister(Arc<Cohort>);

impl Drop for Unregister {
    fn drop(&mut self) {
        self.0.registered.fetch_sub(1, Ordering::Release);
    }
}

struct PoolShared {
    queue: Mutex<VecDeque<PoolTask>>,
    cohorts: Mutex<VecDeque<Arc<Cohort>>>,
}

/// Fixed-size worker pool with burst semantics.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    max_threads: usize,
}

impl WorkerPool {
    /// Creates a pool that will spawn `max_threads` workers per `start`.
    ///
    /// With `max_threads < 2` the pool never spawns threads and runs queued
    /// tasks on the calling thread instead.
    pub fn new(max_threads: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                queue: Mutex::new(VecDeque::new()),
                cohorts: Mutex::new(VecDeque::new()),
            }),
            max_threads,
        }
    }

    /// Enqueues a task. Nothing runs until [`WorkerPool::start`] is called.
    pub fn queue_task(&self, task: impl FnOnce() + Send + 'static) {
        self.queue_boxed(Box::new(task));
    }

    /// Enqueues an already-boxed task.
    pub(crate) fn queue_boxed(&self, task: PoolTask) {
        self.shared.queue.lock().push_back(task);
    }

    /// Returns the thread count this pool was created with.
    #[inline]
    pub fn max_thread_count(&self) -> usize {
        self.max_threads
    }

    /// Returns `true` if the task FIFO is empty.
    pub fn is_queue_empty(&self) -> bool {
        self.shared.queue.lock().is_empty()
    }

    /// Returns `true` if no worker of any cohort is still registered.
    pub fn is_not_running(&self) -> bool {
        self.shared.cohorts.lock().iter().all(|c| c.is_drained())
    }

    /// Starts draining the queue.
    ///
    /// For `max_threads >= 2`, spawns a fresh cohort of workers and returns
    /// immediately; workers exit once they observe an empty queue. For
    /// smaller pools, drains the queue on the calling thread before
    /// returning.
    pub fn start(&self) {
        let _ = self.start_cohort();
    }

    /// Convenience burst: `start`, then block until the FIFO is empty and
    /// this start's cohort has fully unwound.
    pub fn easy_start_and_wait(&self) {
        let _span = profiler::span("WorkerPool::easy_start_and_wait");
        if let Some(cohort) = self.start_cohort() {
            loop {
                thread::sleep(POLL_INTERVAL);
                if self.is_queue_empty() && cohort.is_drained() {
                    break;
                }
            }
        }
    }

    pub(crate) fn start_cohort(&self) -> Option<Arc<Cohort>> {
        if self.max_threads < 2 {
            self.run_tasks_on_caller();
            return None;
        }

        self.collect_drained_cohorts();

        let cohort = Arc::new(Cohort {
            // Workers are registered up front so liveness probes cannot
            // observe an empty cohort before its threads have started.
            registered: AtomicUsize::new(self.max_threads),
        });
        self.shared.cohorts.lock().push_back(Arc::clone(&cohort));

        for _ in 0..self.max_threads {
            let shared = Arc::clone(&self.shared);
            let unregister = Unregister(Arc::clone(&cohort));
            thread::spawn(move || {
                let _unregister = unregister;
                loop {
                    let task = shared.queue.lock().pop_front();
                    match task {
                        Some(task) => task(),
                        None => break,
                    }
                }
            });
        }

        Some(cohort)
    }

    fn run_tasks_on_caller(&self) {
        loop {
            let task = self.shared.queue.lock().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    fn collect_drained_cohorts(&self) {
        let mut cohorts = self.shared.cohorts.lock();
        while let Some(front) = cohorts.front() {
            if front.is_drained() {
                cohorts.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        while !self.is_not_running() {
            thread::sleep(POLL_INTERVAL);
        }
    }
}
