// Generic predicate-driven waiter
//
// A `Waiter` owns a value and a predicate over it, and lets threads block
// until a modification makes the predicate true. Every predicate-true
// transition increments a generation counter; sleeping threads resume only
// on a generation change, which filters spurious wakeups without re-running
// the (possibly stateful) predicate inside the wait loop.

mod barrier;
mod latch;
pub mod predicate;

use std::ops::{AddAssign, Deref, DerefMut, SubAssign};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::lock::acquire;

pub use barrier::Barrier;
pub use latch::Latch;
pub use predicate::{equal_to, greater_than, AtLeast, EqualTo, GreaterThan, HasChanged, Predicate};

/// Waiter that fires on any change of the value (edge trigger).
pub type WaiterForChange<T> = Waiter<T, HasChanged<T>>;
/// Waiter that fires once the value reaches a per-wait threshold.
pub type WaiterForAtLeast<T> = Waiter<T, AtLeast<T>>;
/// Waiter that fires while the value equals a target.
pub type WaiterForEqual<T> = Waiter<T, EqualTo<T>>;
/// Waiter that fires while the value exceeds a bound.
pub type WaiterForGreater<T> = Waiter<T, GreaterThan<T>>;

// Stand-in for "no deadline". Condition variables are not required to
// honor a literal maximum instant, so a point far in the future keeps a
// single code path for timed and untimed waits.
pub(crate) fn far_future() -> Instant {
    const YEAR: u64 = 365 * 24 * 60 * 60;
    Instant::now() + Duration::from_secs(100 * YEAR)
}

struct Inner<T, P> {
    value: T,
    predicate: P,
    generation: u64,
}

/// A guarded value plus a [`Predicate`] over it.
///
/// All observation and mutation of the value happens under one internal
/// mutex. Waits are deadline-based ([`wait_until`](Waiter::wait_until) /
/// [`wait_for`](Waiter::wait_for)) or unbounded ([`wait`](Waiter::wait));
/// timed variants return `false` on timeout.
pub struct Waiter<T, P> {
    inner: Mutex<Inner<T, P>>,
    cond: Condvar,
}

impl<T, P: Default> Waiter<T, P> {
    /// Create a waiter with the predicate's default state.
    pub fn with_value(value: T) -> Self {
        Waiter::new(value, P::default())
    }
}

impl<T: Default, P> Waiter<T, P> {
    /// Create a waiter with a default value.
    pub fn with_predicate(predicate: P) -> Self {
        Waiter::new(T::default(), predicate)
    }
}

impl<T: Default, P: Default> Default for Waiter<T, P> {
    fn default() -> Self {
        Waiter::new(T::default(), P::default())
    }
}

impl<T, P> Waiter<T, P> {
    pub fn new(value: T, predicate: P) -> Self {
        Waiter {
            inner: Mutex::new(Inner {
                value,
                predicate,
                generation: 0,
            }),
            cond: Condvar::new(),
        }
    }
}

impl<T, P: Predicate<T>> Waiter<T, P> {
    fn lock(&self) -> MutexGuard<'_, Inner<T, P>> {
        acquire(self.inner.lock())
    }

    /// Re-test the predicate; on a fresh predicate-true transition bump the
    /// generation and wake everyone. Every mutation path funnels through
    /// here so no transition can be missed.
    fn check_and_notify(&self, inner: &mut Inner<T, P>) -> bool {
        if inner.predicate.test(&inner.value) {
            inner.generation = inner.generation.wrapping_add(1);
            self.cond.notify_all();
            true
        } else {
            false
        }
    }

    fn locked_setup(inner: &mut Inner<T, P>, args: P::Args) -> bool {
        let Inner {
            value, predicate, ..
        } = inner;
        predicate.setup(value, args)
    }

    fn locked_wait_until<'a>(
        &self,
        mut inner: MutexGuard<'a, Inner<T, P>>,
        deadline: Instant,
        args: P::Args,
    ) -> (MutexGuard<'a, Inner<T, P>>, bool) {
        if Self::locked_setup(&mut inner, args) {
            return (inner, true);
        }
        let entry = inner.generation;
        loop {
            if inner.generation != entry {
                return (inner, true);
            }
            let now = Instant::now();
            if now >= deadline {
                return (inner, false);
            }
            let (guard, status) = acquire(self.cond.wait_timeout(inner, deadline - now));
            inner = guard;
            if status.timed_out() && inner.generation == entry {
                return (inner, false);
            }
        }
    }

    /// Evaluate the predicate's `setup` without blocking.
    pub fn try_wait(&self, args: P::Args) -> bool {
        Self::locked_setup(&mut self.lock(), args)
    }

    /// Block until the predicate holds.
    pub fn wait(&self, args: P::Args) {
        let inner = self.lock();
        let _ = self.locked_wait_until(inner, far_future(), args);
    }

    /// Block until the predicate holds or the deadline passes.
    /// Returns `false` on timeout.
    pub fn wait_until(&self, deadline: Instant, args: P::Args) -> bool {
        let inner = self.lock();
        self.locked_wait_until(inner, deadline, args).1
    }

    /// Block for at most `timeout`. Returns `false` on timeout.
    pub fn wait_for(&self, timeout: Duration, args: P::Args) -> bool {
        self.wait_until(Instant::now() + timeout, args)
    }

    /// Run `f` on the value under the lock, then re-test the predicate,
    /// waking all waiters on a fresh predicate-true transition.
    /// Returns what the predicate returned.
    pub fn modify<F: FnOnce(&mut T)>(&self, f: F) -> bool {
        let mut inner = self.lock();
        f(&mut inner.value);
        self.check_and_notify(&mut inner)
    }

    /// [`modify`](Self::modify) composed with a wait, under one lock
    /// acquisition. Returns `false` on timeout.
    pub fn modify_and_wait_until<F: FnOnce(&mut T)>(
        &self,
        deadline: Instant,
        f: F,
        args: P::Args,
    ) -> bool {
        let mut inner = self.lock();
        f(&mut inner.value);
        self.check_and_notify(&mut inner);
        self.locked_wait_until(inner, deadline, args).1
    }

    /// [`modify`](Self::modify) composed with a timed wait.
    pub fn modify_and_wait_for<F: FnOnce(&mut T)>(
        &self,
        timeout: Duration,
        f: F,
        args: P::Args,
    ) -> bool {
        self.modify_and_wait_until(Instant::now() + timeout, f, args)
    }

    /// [`modify`](Self::modify) composed with an unbounded wait.
    pub fn modify_and_wait<F: FnOnce(&mut T)>(&self, f: F, args: P::Args) {
        let _ = self.modify_and_wait_until(far_future(), f, args);
    }

    /// Replace the value and notify if the predicate now holds.
    pub fn set_value(&self, value: T) {
        let mut inner = self.lock();
        inner.value = value;
        self.check_and_notify(&mut inner);
    }

    /// Copy the current value out.
    pub fn get_value(&self) -> T
    where
        T: Clone,
    {
        self.lock().value.clone()
    }

    /// Scoped accessor holding the lock; dropping it re-tests the predicate
    /// and notifies, so mutations through the updater cannot be missed.
    pub fn updater(&self) -> WaiterUpdater<'_, T, P> {
        WaiterUpdater {
            waiter: self,
            inner: self.lock(),
        }
    }

    /// `value += k` via [`modify`](Self::modify).
    pub fn add<K>(&self, k: K)
    where
        T: AddAssign<K>,
    {
        self.modify(|value| *value += k);
    }

    /// `value -= k` via [`modify`](Self::modify).
    pub fn sub<K>(&self, k: K)
    where
        T: SubAssign<K>,
    {
        self.modify(|value| *value -= k);
    }
}

/// Lock-holding accessor vended by [`Waiter::updater`].
pub struct WaiterUpdater<'a, T, P: Predicate<T>> {
    waiter: &'a Waiter<T, P>,
    inner: MutexGuard<'a, Inner<T, P>>,
}

impl<T, P: Predicate<T>> Deref for WaiterUpdater<'_, T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T, P: Predicate<T>> DerefMut for WaiterUpdater<'_, T, P> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner.value
    }
}

impl<T, P: Predicate<T>> Drop for WaiterUpdater<'_, T, P> {
    fn drop(&mut self) {
        self.waiter.check_and_notify(&mut self.inner);
    }
}
