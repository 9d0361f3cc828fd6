// Bounded FIFO queue with blocking and timed pops
//
// Pushes never block: a push into a full or finished queue is dropped and
// counted. Pops block until a value arrives, the queue is finished, or a
// deadline passes, each outcome distinguishable through `PopResult`.

mod shared;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::lock::acquire;

pub use shared::{QueueReader, QueueWriter};

/// Outcome of a queue pop.
///
/// `Valid` carries the moved-out value. A pop that finds a drained,
/// finished queue yields `Empty`; a timed pop that exhausts its deadline
/// yields `Timeout`. `Unset` is the default, not produced by any pop.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum PopResult<T> {
    #[default]
    Unset,
    Valid(T),
    Empty,
    Timeout,
}

impl<T> PopResult<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, PopResult::Valid(_))
    }

    /// The value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            PopResult::Valid(value) => Some(value),
            _ => None,
        }
    }

    fn state_name(&self) -> &'static str {
        match self {
            PopResult::Unset => "unset",
            PopResult::Valid(_) => "valid",
            PopResult::Empty => "empty",
            PopResult::Timeout => "timeout",
        }
    }
}

impl<T> fmt::Display for PopResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

struct QueueInner<T> {
    items: VecDeque<T>,
    done: bool,
    item_count: usize,
    dropped_item_count: usize,
}

/// Thread-safe FIFO queue with a maximum capacity.
///
/// Counters track every attempted push (`item_count`) and every rejected
/// one (`dropped_item_count`); rejection is reported through the boolean
/// return of [`push`](BoundedQueue::push), never as an error.
///
/// Dropping the queue finishes it, so consumers blocked in
/// [`pop`](BoundedQueue::pop) observe [`PopResult::Empty`]. For shared
/// producer/consumer lifetimes, see [`QueueWriter`] / [`QueueReader`].
pub struct BoundedQueue<T> {
    capacity: usize,
    inner: Mutex<QueueInner<T>>,
    consumers: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedQueue {
            capacity,
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                done: false,
                item_count: 0,
                dropped_item_count: 0,
            }),
            consumers: Condvar::new(),
        }
    }

    /// Queue without a practical capacity limit.
    pub fn unbounded() -> Self {
        BoundedQueue::new(usize::MAX)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lock the queue for a batch of operations (bulk builds use
    /// [`QueueGuard::push_no_notify`] and one [`notify_all`](Self::notify_all)
    /// at the end instead of a notification per element).
    pub fn lock(&self) -> QueueGuard<'_, T> {
        QueueGuard {
            capacity: self.capacity,
            inner: acquire(self.inner.lock()),
        }
    }

    /// Enqueue a value and notify one consumer.
    ///
    /// Returns `false` if the queue is finished or full; the value is
    /// dropped and the drop counter incremented. Either way the item
    /// counter is incremented.
    pub fn push(&self, value: T) -> bool {
        let accepted = self.lock().push_no_notify(value);
        self.consumers.notify_one();
        accepted
    }

    /// Non-blocking pop; [`PopResult::Empty`] when nothing is queued.
    pub fn try_pop(&self) -> PopResult<T> {
        self.lock().try_pop()
    }

    /// Block until a value arrives or the queue is finished.
    pub fn pop(&self) -> PopResult<T> {
        let mut inner = acquire(self.inner.lock());
        while Self::should_wait(&inner) {
            inner = acquire(self.consumers.wait(inner));
        }
        Self::take_front(&mut inner)
    }

    /// Wait at most one notification, then attempt a pop.
    pub fn pop_unchecked(&self) -> PopResult<T> {
        let mut inner = acquire(self.inner.lock());
        if Self::should_wait(&inner) {
            inner = acquire(self.consumers.wait(inner));
        }
        Self::take_front(&mut inner)
    }

    /// Same as [`pop`](Self::pop), giving up at the deadline with
    /// [`PopResult::Timeout`]. A finished and drained queue still yields
    /// [`PopResult::Empty`].
    pub fn pop_wait_until(&self, deadline: Instant) -> PopResult<T> {
        let mut inner = acquire(self.inner.lock());
        loop {
            if !Self::should_wait(&inner) {
                return Self::take_front(&mut inner);
            }
            let now = Instant::now();
            if now >= deadline {
                return PopResult::Timeout;
            }
            let (guard, status) = acquire(self.consumers.wait_timeout(inner, deadline - now));
            inner = guard;
            if status.timed_out() {
                return PopResult::Timeout;
            }
        }
    }

    /// Same as [`pop_wait_until`](Self::pop_wait_until) with a relative
    /// timeout.
    pub fn pop_wait_for(&self, timeout: Duration) -> PopResult<T> {
        self.pop_wait_until(Instant::now() + timeout)
    }

    /// Close the queue for producers and wake all consumers; pending and
    /// future pops drain the remaining values, then return
    /// [`PopResult::Empty`]. Irreversible.
    pub fn notify_to_finish(&self) {
        {
            let mut inner = acquire(self.inner.lock());
            inner.done = true;
        }
        self.consumers.notify_all();
    }

    /// Wake all consumers without changing any state.
    pub fn notify_all(&self) {
        self.consumers.notify_all();
    }

    /// Call `f` on each immediately available value, until
    /// [`try_pop`](Self::try_pop) comes up empty.
    pub fn drain_with<F: FnMut(T)>(&self, mut f: F) {
        while let PopResult::Valid(value) = self.try_pop() {
            f(value);
        }
    }

    pub fn is_done(&self) -> bool {
        self.lock().is_done()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Total pushes attempted, accepted or not.
    pub fn item_count(&self) -> usize {
        self.lock().item_count()
    }

    /// Pushes rejected because the queue was finished or full.
    pub fn dropped_item_count(&self) -> usize {
        self.lock().dropped_item_count()
    }

    fn should_wait(inner: &QueueInner<T>) -> bool {
        !inner.done && inner.items.is_empty()
    }

    fn take_front(inner: &mut QueueInner<T>) -> PopResult<T> {
        match inner.items.pop_front() {
            Some(value) => PopResult::Valid(value),
            None => PopResult::Empty,
        }
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        self.notify_to_finish();
    }
}

/// Build an unbounded queue from an iterator, batching the pushes under a
/// single lock acquisition.
impl<T> FromIterator<T> for BoundedQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let queue = BoundedQueue::unbounded();
        {
            let mut guard = queue.lock();
            for item in iter {
                guard.push_no_notify(item);
            }
        }
        queue
    }
}

/// Lock-holding view of a [`BoundedQueue`], for batched operations and
/// consistent multi-counter reads.
pub struct QueueGuard<'a, T> {
    capacity: usize,
    inner: MutexGuard<'a, QueueInner<T>>,
}

impl<T> QueueGuard<'_, T> {
    /// [`push`](BoundedQueue::push) without the consumer notification.
    pub fn push_no_notify(&mut self, value: T) -> bool {
        self.inner.item_count += 1;
        if self.inner.done || self.inner.items.len() >= self.capacity {
            self.inner.dropped_item_count += 1;
            trace!(
                dropped = self.inner.dropped_item_count,
                "push rejected, value dropped"
            );
            return false;
        }
        self.inner.items.push_back(value);
        true
    }

    pub fn try_pop(&mut self) -> PopResult<T> {
        match self.inner.items.pop_front() {
            Some(value) => PopResult::Valid(value),
            None => PopResult::Empty,
        }
    }

    pub fn is_done(&self) -> bool {
        self.inner.done
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.items.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.items.len()
    }

    pub fn item_count(&self) -> usize {
        self.inner.item_count
    }

    pub fn dropped_item_count(&self) -> usize {
        self.inner.dropped_item_count
    }
}
