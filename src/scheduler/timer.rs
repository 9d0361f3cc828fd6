// Single-worker deadline scheduler
//
// Callbacks are kept in a min-heap by deadline and executed on one lazily
// spawned worker thread, so two callbacks never overlap and they run in
// ascending deadline order. A callback is never invoked before its
// deadline, but a long-running one defers those behind it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::lock::acquire;

type Callback = Box<dyn FnOnce() + Send>;

// Wait bound while the heap is empty; a notification arrives long before.
const IDLE_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

struct Action {
    deadline: Instant,
    callback: Callback,
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Eq for Action {}

impl PartialOrd for Action {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Action {
    // `BinaryHeap` is a max-heap; reverse the deadline order so the
    // earliest action surfaces at the top.
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

struct SchedulerInner {
    done: bool,
    actions: BinaryHeap<Action>,
    worker: Option<thread::JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<SchedulerInner>,
    cond: Condvar,
}

/// Schedule callbacks to run at (not before) a point in time.
///
/// The worker thread is spawned on the first `delay_*` call and joined on
/// drop. Panics inside a callback are contained and logged; they never take
/// the worker down.
///
/// ```
/// use std::time::Duration;
/// use rendezvous::Scheduler;
///
/// let scheduler = Scheduler::new();
/// scheduler.delay_for(Duration::from_millis(5), || println!("later"));
/// ```
#[derive(Default)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Default for Shared {
    fn default() -> Self {
        Shared {
            inner: Mutex::new(SchedulerInner {
                done: false,
                actions: BinaryHeap::new(),
                worker: None,
            }),
            cond: Condvar::new(),
        }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once `deadline` is reached. Dropped silently if the
    /// scheduler is shutting down.
    pub fn delay_until<F>(&self, deadline: Instant, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_no_notify(deadline, Box::new(callback));
        self.shared.cond.notify_all();
    }

    /// Run `callback` once `duration` has passed, measured from now.
    pub fn delay_for<F>(&self, duration: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.delay_until(Instant::now() + duration, callback);
    }

    /// Drop all pending actions. A callback that is already running is not
    /// interrupted.
    pub fn clear(&self) {
        {
            let mut inner = acquire(self.shared.inner.lock());
            inner.actions = BinaryHeap::new();
        }
        self.shared.cond.notify_all();
    }

    fn schedule_no_notify(&self, deadline: Instant, callback: Callback) {
        let mut inner = acquire(self.shared.inner.lock());
        if inner.done {
            trace!("scheduler shutting down, action dropped");
            return;
        }
        if inner.worker.is_none() {
            let shared = Arc::clone(&self.shared);
            match thread::Builder::new()
                .name("scheduler".into())
                .spawn(move || worker(shared))
            {
                Ok(handle) => inner.worker = Some(handle),
                Err(error) => warn!(%error, "could not spawn scheduler worker"),
            }
        }
        inner.actions.push(Action { deadline, callback });
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let worker = {
            let mut inner = acquire(self.shared.inner.lock());
            inner.done = true;
            inner.worker.take()
        };
        self.shared.cond.notify_all();
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }
}

fn worker(shared: Arc<Shared>) {
    let mut inner = acquire(shared.inner.lock());
    while !inner.done {
        let wakeup = match inner.actions.peek() {
            Some(action) => action.deadline,
            None => Instant::now() + IDLE_WAIT,
        };

        let now = Instant::now();
        let timed_out = if now >= wakeup {
            true
        } else {
            let (guard, status) = acquire(shared.cond.wait_timeout(inner, wakeup - now));
            inner = guard;
            status.timed_out()
        };

        // on a plain notification just re-evaluate: either a new action
        // arrived or we are shutting down
        if !timed_out {
            continue;
        }
        if inner.done {
            break;
        }
        if let Some(action) = inner.actions.pop() {
            drop(inner);
            trace!("running scheduled action");
            if catch_unwind(AssertUnwindSafe(action.callback)).is_err() {
                warn!("scheduled callback panicked");
            }
            inner = acquire(shared.inner.lock());
        }
    }
}
