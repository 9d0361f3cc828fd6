// One-shot and two-state atomic flags

use std::sync::atomic::{AtomicBool, Ordering};

/// A flag that can be raised exactly once.
///
/// [`set`](DoneFlag::set) returns the *previous* value, so the first caller
/// observes `false` and everyone after it observes `true`. Used to make
/// transitions idempotent (e.g. only the first `notify` of a
/// [`OneTimeSignal`](crate::OneTimeSignal) fulfills it).
#[derive(Debug, Default)]
pub struct DoneFlag {
    flag: AtomicBool,
}

impl DoneFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and return whether it was already raised.
    pub fn set(&self) -> bool {
        self.flag.swap(true, Ordering::AcqRel)
    }
}

/// A resettable boolean flag.
#[derive(Debug, Default)]
pub struct Flag {
    value: AtomicBool,
}

impl Flag {
    pub fn new(value: bool) -> Self {
        Flag {
            value: AtomicBool::new(value),
        }
    }

    /// Exchange the stored value, returning the prior one.
    pub fn set(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }

    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }
}
