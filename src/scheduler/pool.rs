// Thread pool that only keeps workers while work exists
//
// Workers are spawned per job up to the limit and retire themselves once
// the job queue drains; an idle pool holds no threads at all. Retirement is
// decided while holding the lock, so a job enqueued concurrently is either
// picked up by the retiring worker or triggers a fresh spawn.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread;

use tracing::{debug, trace, warn};

use crate::lock::acquire;

type Job = Box<dyn FnOnce() + Send>;

struct PoolInner {
    jobs: VecDeque<Job>,
    workers: usize,
}

struct PoolShared {
    inner: Mutex<PoolInner>,
    // installed only by the drop path, so a pool that is still accepting
    // work never pays for it
    terminating: OnceLock<Condvar>,
}

/// A pool of at most `max_workers` threads, created on demand.
///
/// Dropping the pool blocks until all previously added jobs have finished
/// and every worker has retired. Adding a job concurrently with the drop is
/// a contract violation on the caller's side.
pub struct LazyThreadPool {
    max_workers: usize,
    shared: Arc<PoolShared>,
}

impl LazyThreadPool {
    pub fn new(max_workers: usize) -> Self {
        LazyThreadPool {
            max_workers,
            shared: Arc::new(PoolShared {
                inner: Mutex::new(PoolInner {
                    jobs: VecDeque::new(),
                    workers: 0,
                }),
                terminating: OnceLock::new(),
            }),
        }
    }

    /// Enqueue a job, spawning a worker if the pool is below its limit.
    ///
    /// Returns `true` once the job is queued. Failure to spawn is skipped
    /// silently; the job waits for an existing worker or a later spawn.
    pub fn add_job<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = acquire(self.shared.inner.lock());
        inner.jobs.push_back(Box::new(job));

        if inner.workers < self.max_workers {
            let shared = Arc::clone(&self.shared);
            match thread::Builder::new()
                .name("lazy-pool-worker".into())
                .spawn(move || worker(shared))
            {
                // the handle is dropped: workers are detached from birth
                // and tracked only through the counter
                Ok(_handle) => inner.workers += 1,
                Err(error) => debug!(%error, "could not spawn pool worker"),
            }
        }
        true
    }
}

impl Drop for LazyThreadPool {
    fn drop(&mut self) {
        let mut inner = acquire(self.shared.inner.lock());
        if inner.workers == 0 {
            return;
        }
        let terminating = self.shared.terminating.get_or_init(Condvar::new);
        while inner.workers > 0 {
            inner = acquire(terminating.wait(inner));
        }
    }
}

fn worker(shared: Arc<PoolShared>) {
    let mut inner = acquire(shared.inner.lock());
    loop {
        match inner.jobs.pop_front() {
            Some(job) => {
                drop(inner);
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("pool job panicked");
                }
                inner = acquire(shared.inner.lock());
            }
            // queue drained: retire while still holding the lock
            None => break,
        }
    }

    trace!("pool worker retiring");
    inner.workers -= 1;
    if inner.workers == 0 {
        if let Some(terminating) = shared.terminating.get() {
            terminating.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn all_jobs_run_before_drop_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = LazyThreadPool::new(4);
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                assert!(pool.add_job(move || {
                    thread::sleep(Duration::from_millis(10));
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn worker_count_stays_within_limit() {
        let limit = 4usize;
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        {
            let pool = LazyThreadPool::new(limit);
            for _ in 0..16 {
                let live = Arc::clone(&live);
                let peak = Arc::clone(&peak);
                pool.add_job(move || {
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    live.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }
        assert!(peak.load(Ordering::SeqCst) <= limit);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn idle_pool_drops_without_blocking() {
        let pool = LazyThreadPool::new(8);
        drop(pool);
    }

    #[test]
    fn panicking_job_does_not_wedge_the_pool() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = LazyThreadPool::new(2);
            pool.add_job(|| panic!("job failure"));
            let counter = Arc::clone(&counter);
            pool.add_job(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn workers_retire_when_idle_and_respawn_for_new_work() {
        let pool = LazyThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        let first = Arc::clone(&counter);
        pool.add_job(move || {
            first.fetch_add(1, Ordering::SeqCst);
        });

        // let the first batch drain and the workers retire
        thread::sleep(Duration::from_millis(100));
        assert_eq!(acquire(pool.shared.inner.lock()).workers, 0);

        let second = Arc::clone(&counter);
        pool.add_job(move || {
            second.fetch_add(1, Ordering::SeqCst);
        });
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
