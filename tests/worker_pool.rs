use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ecm_framework::WorkerPool;

#[test]
fn burst_runs_every_queued_task() {
    let pool = WorkerPool::new(4);
    assert_eq!(pool.max_thread_count(), 4);
    assert!(pool.is_queue_empty());
    assert!(pool.is_not_running());

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..100 {
        let counter = Arc::clone(&counter);
        pool.queue_task(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    assert!(!pool.is_queue_empty());

    pool.easy_start_and_wait();

    assert_eq!(counter.load(Ordering::Relaxed), 100);
    assert!(pool.is_queue_empty());
    assert!(pool.is_not_running());
}

#[test]
fn single_thread_pool_runs_on_the_caller() {
    let pool = WorkerPool::new(1);
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        pool.queue_task(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    // start() drains synchronously when below two workers, so the effects
    // are visible immediately.
    pool.start();
    assert_eq!(counter.load(Ordering::Relaxed), 10);
    assert!(pool.is_queue_empty());
    assert!(pool.is_not_running());
}

#[test]
fn zero_thread_pool_behaves_like_single_thread() {
    let pool = WorkerPool::new(0);
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let counter = Arc::clone(&counter);
        pool.queue_task(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    pool.easy_start_and_wait();
    assert_eq!(counter.load(Ordering::Relaxed), 1);
}

#[test]
fn repeated_bursts_reuse_the_pool() {
    let pool = WorkerPool::new(2);
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.queue_task(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.easy_start_and_wait();
    }

    assert_eq!(counter.load(Ordering::Relaxed), 60);
}

#[test]
fn tasks_do_not_run_before_start() {
    let pool = WorkerPool::new(2);
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let counter = Arc::clone(&counter);
        pool.queue_task(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(counter.load(Ordering::Relaxed), 0);
    assert!(!pool.is_queue_empty());

    pool.easy_start_and_wait();
    assert_eq!(counter.load(Ordering::Relaxed), 1);
}

#[test]
fn workers_unwind_after_the_queue_drains() {
    let pool = WorkerPool::new(3);
    for _ in 0..5 {
        pool.queue_task(|| {});
    }
    pool.easy_start_and_wait();
    assert!(pool.is_not_running());

    // A later burst spawns a fresh cohort and completes as well.
    let ran = Arc::new(AtomicUsize::new(0));
    {
        let ran = Arc::clone(&ran);
        pool.queue_task(move || {
            ran.fetch_add(1, Ordering::Relaxed);
        });
    }
    pool.easy_start_and_wait();
    assert_eq!(ran.load(Ordering::Relaxed), 1);
}

#[test]
fn tasks_queued_from_tasks_are_picked_up() {
    let pool = Arc::new(WorkerPool::new(2));
    let counter = Arc::new(AtomicUsize::new(0));

    {
        let counter = Arc::clone(&counter);
        let pool2 = Arc::clone(&pool);
        pool.queue_task(move || {
            counter.fetch_add(1, Ordering::Relaxed);
            let counter = Arc::clone(&counter);
            pool2.queue_task(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
            pool2.start();
        });
    }

    pool.easy_start_and_wait();

    // Both the outer task and the task it queued have run.
    while counter.load(Ordering::Relaxed) < 2 {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(counter.load(Ordering::Relaxed), 2);
}

#[test]
fn drop_waits_for_running_work() {
    let finished = Arc::new(AtomicUsize::new(0));
    {
        let pool = WorkerPool::new(2);
        for _ in 0..4 {
            let finished = Arc::clone(&finished);
            pool.queue_task(move || {
                std::thread::sleep(Duration::from_millis(5));
                finished.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.start();
        // Dropping the pool here must block until the workers unwind.
    }
    assert_eq!(finished.load(Ordering::Relaxed), 4);
}
