// Mutex-guarded value with a scoped accessor

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use crate::lock::acquire;

/// A value that can only be reached through a lock-holding [`Updater`].
///
/// ```
/// use rendezvous::SynchronizedValue;
///
/// let shared = SynchronizedValue::new(vec![1, 2]);
/// shared.updater().push(3);
/// assert_eq!(shared.get(), vec![1, 2, 3]);
/// ```
#[derive(Debug, Default)]
pub struct SynchronizedValue<T> {
    value: Mutex<T>,
}

impl<T> SynchronizedValue<T> {
    pub fn new(value: T) -> Self {
        SynchronizedValue {
            value: Mutex::new(value),
        }
    }

    /// Lock the value and return a scoped accessor.
    ///
    /// The lock is held for the lifetime of the returned guard; do not call
    /// back into blocking APIs of the same object while holding it.
    pub fn updater(&self) -> Updater<'_, T> {
        Updater {
            guard: acquire(self.value.lock()),
        }
    }

    /// Copy the current value out.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        let guard = self.updater();
        (*guard).clone()
    }

    /// Replace the current value.
    pub fn set(&self, value: T) {
        *self.updater() = value;
    }
}

/// Scoped accessor vended by [`SynchronizedValue::updater`].
///
/// Move-only; dropping it releases the lock.
pub struct Updater<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for Updater<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Updater<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for Updater<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn basic_get_and_set() {
        let value = SynchronizedValue::new(5);
        assert_eq!(value.get(), 5);
        value.set(17);
        assert_eq!(value.get(), 17);
    }

    #[test]
    fn updater_mutates_in_place() {
        let value = SynchronizedValue::new(String::from("a"));
        value.updater().push('b');
        assert_eq!(value.get(), "ab");
    }

    #[test]
    fn map_access_through_updater() {
        let value: SynchronizedValue<HashMap<&str, i32>> = SynchronizedValue::default();
        value.updater().insert("answer", 42);
        assert_eq!(value.updater().get("answer"), Some(&42));
    }

    #[test]
    fn concurrent_increments_do_not_race() {
        let value = Arc::new(SynchronizedValue::new(0u32));
        let mut workers = Vec::new();
        for _ in 0..8 {
            let value = Arc::clone(&value);
            workers.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *value.updater() += 1;
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(value.get(), 8000);
    }
}
