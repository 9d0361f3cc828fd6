// Single-use countdown latch
//
// A latch is the waiter-for-zero specialization of the generic waiter:
// predicate "value == 0", mutation restricted to counting down.

use std::sync::MutexGuard;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::waiter::predicate::{equal_to, EqualTo};
use crate::waiter::{far_future, Inner, Waiter};

/// One or more threads block until the count reaches zero.
///
/// Single-use: once released, another [`count_down`](Latch::count_down) is a
/// usage error and returns [`Error::LatchReleased`].
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use rendezvous::Latch;
///
/// let latch = Arc::new(Latch::new(2));
/// for _ in 0..2 {
///     let latch = Arc::clone(&latch);
///     thread::spawn(move || latch.count_down().unwrap());
/// }
/// latch.wait();
/// ```
pub struct Latch {
    waiter: Waiter<usize, EqualTo<usize>>,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Latch {
            waiter: Waiter::new(count, equal_to(0)),
        }
    }

    /// Lock the counter, failing if it already reached zero.
    fn checked_lock(&self) -> Result<MutexGuard<'_, Inner<usize, EqualTo<usize>>>> {
        let mut inner = self.waiter.lock();
        if Waiter::locked_setup(&mut inner, ()) {
            return Err(Error::LatchReleased);
        }
        Ok(inner)
    }

    /// Decrement the count. Returns `Ok(true)` when this call released the
    /// latch, `Err` if it was already released.
    pub fn count_down(&self) -> Result<bool> {
        let mut inner = self.checked_lock()?;
        inner.value -= 1;
        Ok(self.waiter.check_and_notify(&mut inner))
    }

    /// Decrement, then wait until the count reaches zero or the deadline
    /// passes. Returns `Ok(false)` on timeout.
    pub fn count_down_and_wait_until(&self, deadline: Instant) -> Result<bool> {
        let mut inner = self.checked_lock()?;
        inner.value -= 1;
        self.waiter.check_and_notify(&mut inner);
        Ok(self.waiter.locked_wait_until(inner, deadline, ()).1)
    }

    /// Decrement, then wait for at most `timeout`.
    pub fn count_down_and_wait_for(&self, timeout: Duration) -> Result<bool> {
        self.count_down_and_wait_until(Instant::now() + timeout)
    }

    /// Decrement, then wait until the count reaches zero.
    pub fn count_down_and_wait(&self) -> Result<()> {
        self.count_down_and_wait_until(far_future()).map(|_| ())
    }

    /// `true` once the count reached zero; never blocks.
    pub fn try_wait(&self) -> bool {
        self.waiter.try_wait(())
    }

    pub fn wait(&self) {
        self.waiter.wait(());
    }

    /// Returns `false` on timeout.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        self.waiter.wait_until(deadline, ())
    }

    /// Returns `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.waiter.wait_for(timeout, ())
    }

    pub fn count(&self) -> usize {
        self.waiter.get_value()
    }
}
