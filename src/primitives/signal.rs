// Single-shot completion signalling
//
// `OneTimeFutureValue` is a shared one-shot cell: any handle may complete it
// with a value or a captured panic, any handle may wait on it, and only the
// first completion wins. `OneTimeSignal` is the value-less specialization
// used for cooperative shutdown.

use std::any::Any;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::lock::acquire;
use crate::primitives::flag::DoneFlag;

/// Payload of a captured panic, as produced by `std::thread::JoinHandle::join`.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

enum Slot<T> {
    Pending,
    Ready(std::thread::Result<T>),
    Taken,
}

struct State<T> {
    once: DoneFlag,
    slot: Mutex<Slot<T>>,
    cond: Condvar,
}

/// A shared promise/future pair delivering a value or a captured panic.
///
/// Cloning yields another handle to the same cell, so a producer thread and
/// a consumer thread can each hold one. Completions after the first are
/// silently discarded.
pub struct OneTimeFutureValue<T> {
    state: Arc<State<T>>,
}

impl<T> Clone for OneTimeFutureValue<T> {
    fn clone(&self) -> Self {
        OneTimeFutureValue {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for OneTimeFutureValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OneTimeFutureValue<T> {
    pub fn new() -> Self {
        OneTimeFutureValue {
            state: Arc::new(State {
                once: DoneFlag::new(),
                slot: Mutex::new(Slot::Pending),
                cond: Condvar::new(),
            }),
        }
    }

    /// Complete the cell with a value. No-op if already completed.
    pub fn set_value(&self, value: T) {
        self.complete(Ok(value));
    }

    /// Complete the cell with a panic payload, re-raised by [`get`](Self::get).
    /// No-op if already completed.
    pub fn set_panic(&self, payload: PanicPayload) {
        self.complete(Err(payload));
    }

    fn complete(&self, outcome: std::thread::Result<T>) {
        if self.state.once.set() {
            trace!("discarding completion of an already-set future value");
            return;
        }
        let mut slot = acquire(self.state.slot.lock());
        *slot = Slot::Ready(outcome);
        self.state.cond.notify_all();
    }

    /// Block until the cell is completed.
    pub fn wait(&self) {
        let mut slot = acquire(self.state.slot.lock());
        while matches!(*slot, Slot::Pending) {
            slot = acquire(self.state.cond.wait(slot));
        }
    }

    /// Block until the cell is completed or the deadline passes.
    ///
    /// Returns `true` if the deadline passed without a completion.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut slot = acquire(self.state.slot.lock());
        loop {
            if !matches!(*slot, Slot::Pending) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, status) = acquire(self.state.cond.wait_timeout(slot, deadline - now));
            slot = guard;
            if status.timed_out() && matches!(*slot, Slot::Pending) {
                return true;
            }
        }
    }

    /// Block for at most `timeout`. Returns `true` if it timed out.
    ///
    /// Note the sense: `true` means *no* completion arrived in time, the
    /// same convention `std::future::wait_for == timeout` had in the wild.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Block until completed and take the value out.
    ///
    /// Re-raises the producer's panic if the cell was completed with
    /// [`set_panic`](Self::set_panic). Taking the value twice is a usage
    /// error and panics.
    pub fn get(&self) -> T {
        let mut slot = acquire(self.state.slot.lock());
        while matches!(*slot, Slot::Pending) {
            slot = acquire(self.state.cond.wait(slot));
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(Ok(value)) => value,
            Slot::Ready(Err(payload)) => {
                drop(slot);
                std::panic::resume_unwind(payload)
            }
            Slot::Taken => panic!("future value already taken"),
            Slot::Pending => unreachable!("waited for completion above"),
        }
    }
}

/// A one-shot wakeup for exactly this handshake:
///
/// 1. the owner creates the signal,
/// 2. a worker sleeps in repeated [`wait_for`](OneTimeSignal::wait_for) calls,
/// 3. the owner calls [`notify`](OneTimeSignal::notify),
/// 4. the worker drops out of the wait and finishes.
///
/// Later `notify` calls are no-ops.
#[derive(Clone, Default)]
pub struct OneTimeSignal {
    value: OneTimeFutureValue<()>,
}

impl OneTimeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.value.set_value(());
    }

    /// Sleep at least `timeout` unless notified.
    ///
    /// Returns `true` on timeout, i.e. while the signal has *not* fired.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.value.wait_for(timeout)
    }

    /// Same as [`wait_for`](Self::wait_for) with an absolute deadline.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        self.value.wait_until(deadline)
    }

    /// Block until notified.
    pub fn wait(&self) {
        self.value.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn notify_is_idempotent() {
        let signal = OneTimeSignal::new();
        signal.notify();
        signal.notify();
        assert!(!signal.wait_for(Duration::from_millis(1)));
    }

    #[test]
    fn wait_for_times_out_without_notify() {
        let signal = OneTimeSignal::new();
        assert!(signal.wait_for(Duration::from_millis(10)));
    }

    #[test]
    fn wait_for_returns_early_on_notify() {
        let signal = OneTimeSignal::new();
        let remote = signal.clone();
        let worker = thread::spawn(move || remote.wait_for(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        signal.notify();
        assert!(!worker.join().unwrap());
    }

    #[test]
    fn first_completion_wins() {
        let value = OneTimeFutureValue::new();
        value.set_value(1);
        value.set_value(2);
        assert_eq!(value.get(), 1);
    }

    #[test]
    fn get_reraises_captured_panic() {
        let value: OneTimeFutureValue<i32> = OneTimeFutureValue::new();
        value.set_panic(Box::new("boom"));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| value.get()));
        assert!(result.is_err());
    }

    #[test]
    fn value_crosses_threads() {
        let value = OneTimeFutureValue::new();
        let producer = value.clone();
        thread::spawn(move || producer.set_value(String::from("done")));
        assert_eq!(value.get(), "done");
    }
}
