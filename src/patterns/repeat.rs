// Guarded periodic invocation
//
// `repeat` runs an action at an interval on its own thread; the returned
// guard bounds the thread's lifetime. The worker sleeps in the stop
// signal's `wait_for`, so cancellation takes effect at the next interval
// boundary at the latest.

use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::primitives::OneTimeSignal;

/// Call `action` every `interval` until the returned guard is stopped or
/// dropped. The first call happens after one full interval.
pub fn repeat<F>(interval: Duration, mut action: F) -> RepeatGuard
where
    F: FnMut() + Send + 'static,
{
    repeat_until(interval, move || {
        action();
        false
    })
}

/// Like [`repeat`], but the action returns a stop request: **`true` means
/// stop**. (Not to be confused with [`OneTimeSignal::wait_for`], where
/// `true` means the wait timed out.)
pub fn repeat_until<F>(interval: Duration, mut action: F) -> RepeatGuard
where
    F: FnMut() -> bool + Send + 'static,
{
    let signal = OneTimeSignal::new();
    let stop = signal.clone();
    let worker = thread::Builder::new()
        .name("repeat".into())
        .spawn(move || {
            // loop while the wait timed out, i.e. no stop was requested
            while stop.wait_for(interval) {
                if action() {
                    trace!("repeat action requested stop");
                    break;
                }
            }
        })
        .expect("failed to spawn repeat worker");
    RepeatGuard {
        signal,
        worker: Some(worker),
    }
}

/// Owns the repeating thread started by [`repeat`] / [`repeat_until`].
///
/// A panic in the action ends the loop and is captured;
/// [`stop`](RepeatGuard::stop) and [`wait`](RepeatGuard::wait) re-raise it,
/// the drop discards it. Move-only.
pub struct RepeatGuard {
    signal: OneTimeSignal,
    worker: Option<thread::JoinHandle<()>>,
}

impl RepeatGuard {
    /// Request the loop to stop and wait for the thread; re-raises a panic
    /// captured from the action.
    pub fn stop(&mut self) {
        self.signal.notify();
        self.wait();
    }

    /// Wait for the thread to end on its own (action returned `true` or
    /// panicked); re-raises a captured panic.
    pub fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(payload) = worker.join() {
                std::panic::resume_unwind(payload);
            }
        }
    }
}

impl Drop for RepeatGuard {
    fn drop(&mut self) {
        self.signal.notify();
        if let Some(worker) = self.worker.take() {
            // a captured panic is deliberately discarded here
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn action_runs_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let remote = Arc::clone(&count);
        let mut guard = repeat(Duration::from_millis(5), move || {
            remote.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(100));
        guard.stop();

        let observed = count.load(Ordering::SeqCst);
        assert!(observed >= 1);

        // no further invocations after stop
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), observed);
    }

    #[test]
    fn true_from_the_action_ends_the_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let remote = Arc::clone(&count);
        let mut guard = repeat_until(Duration::from_millis(1), move || {
            remote.fetch_add(1, Ordering::SeqCst) + 1 >= 3
        });

        guard.wait();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn stop_reraises_action_panic() {
        let mut guard = repeat(Duration::from_millis(1), || panic!("periodic failure"));
        thread::sleep(Duration::from_millis(50));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| guard.stop()));
        assert!(result.is_err());
    }

    #[test]
    fn drop_discards_action_panic() {
        let guard = repeat(Duration::from_millis(1), || panic!("periodic failure"));
        thread::sleep(Duration::from_millis(20));
        drop(guard); // must not propagate
    }

    #[test]
    fn dropping_before_first_interval_skips_the_action() {
        let count = Arc::new(AtomicUsize::new(0));
        let remote = Arc::clone(&count);
        let guard = repeat(Duration::from_secs(60), move || {
            remote.fetch_add(1, Ordering::SeqCst);
        });
        drop(guard);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
