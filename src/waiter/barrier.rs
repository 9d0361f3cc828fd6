// Cycling barrier with a reset function
//
// Unlike the single-use latch, the barrier reseeds its counter whenever it
// reaches zero. The caller-supplied reset function maps the previous reset
// count to the next cycle's count, so the barrier can grow or shrink
// between cycles.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::waiter::predicate::Predicate;
use crate::waiter::{far_future, Waiter};

/// Counter, latest reset count, and the reset function, all guarded by the
/// waiter's single mutex.
struct Cycle {
    count: usize,
    reset_count: usize,
    reset: Box<dyn Fn(usize) -> usize + Send>,
}

struct CountIsZero;

impl Predicate<Cycle> for CountIsZero {
    type Args = ();

    fn test(&self, cycle: &Cycle) -> bool {
        cycle.count == 0
    }

    fn setup(&mut self, cycle: &Cycle, _args: ()) -> bool {
        self.test(cycle)
    }
}

/// Threads decrement the counter and block until it reaches zero; the
/// thread that trips the transition runs the reset function, reseeds the
/// counter from its result, and releases the cycle's waiters.
///
/// A generation token inside the waiter guarantees threads that entered a
/// cycle leave in that cycle, exactly once.
pub struct Barrier {
    waiter: Waiter<Cycle, CountIsZero>,
}

impl Barrier {
    /// Create a barrier with an initial count and a reset function.
    ///
    /// A zero initial count is rejected with [`Error::InvalidArgument`].
    pub fn new<F>(count: usize, reset: F) -> Result<Self>
    where
        F: Fn(usize) -> usize + Send + 'static,
    {
        if count == 0 {
            return Err(Error::InvalidArgument(
                "barrier created with a count of zero".into(),
            ));
        }
        Ok(Barrier {
            waiter: Waiter::new(
                Cycle {
                    count,
                    reset_count: count,
                    reset: Box::new(reset),
                },
                CountIsZero,
            ),
        })
    }

    /// Barrier that keeps the same count on every cycle.
    pub fn cycling(count: usize) -> Result<Self> {
        Barrier::new(count, |count| count)
    }

    /// Decrement the counter; block until the cycle completes or the
    /// deadline passes. The tripping caller returns `Ok(true)` immediately
    /// after reseeding. `Ok(false)` means timeout.
    pub fn count_down_and_wait_until(&self, deadline: Instant) -> Result<bool> {
        let mut inner = self.waiter.lock();
        if inner.value.count == 0 {
            return Err(Error::LatchReleased);
        }
        inner.value.count -= 1;
        if self.waiter.check_and_notify(&mut inner) {
            // we tripped the transition: reseed for the next cycle
            let next = (inner.value.reset)(inner.value.reset_count);
            inner.value.reset_count = next;
            inner.value.count = next;
            return Ok(true);
        }
        Ok(self.waiter.locked_wait_until(inner, deadline, ()).1)
    }

    /// Timed variant of [`count_down_and_wait`](Self::count_down_and_wait).
    pub fn count_down_and_wait_for(&self, timeout: Duration) -> Result<bool> {
        self.count_down_and_wait_until(Instant::now() + timeout)
    }

    /// Decrement the counter and block until the cycle completes.
    pub fn count_down_and_wait(&self) -> Result<()> {
        self.count_down_and_wait_until(far_future()).map(|_| ())
    }

    /// The count produced by the most recent reset (the initial count until
    /// the first cycle completes).
    pub fn reset_count(&self) -> usize {
        self.waiter.lock().value.reset_count
    }
}
