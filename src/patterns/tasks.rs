// Index-distributed task execution
//
// `run_tasks` executes a collection of prepared tasks on exactly the
// requested number of workers, each pulling the next index from a shared
// atomic counter. No queue, no futures: the minimal fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use tracing::debug;

use crate::error::{Error, Result};
use crate::lock::acquire;

/// A prepared unit of work for [`run_tasks`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Run `tasks` on `thread_count` workers and return once all are done.
///
/// Zero tasks is fine (and ignores the thread count). Zero threads with
/// tasks pending is a usage error, as is a combined task/thread count
/// outside the supported range.
pub fn run_tasks(tasks: Vec<Task>, thread_count: usize) -> Result<()> {
    if tasks.is_empty() {
        return Ok(());
    }
    if thread_count == 0 {
        return Err(Error::InvalidArgument(
            "zero threads cannot execute a nonzero number of tasks".into(),
        ));
    }
    if tasks.len() as u64 + thread_count as u64 + 1 > i32::MAX as u64 {
        return Err(Error::InvalidArgument(
            "tasks plus threads exceed the supported range".into(),
        ));
    }

    let slots: Vec<Mutex<Option<Task>>> = tasks
        .into_iter()
        .map(|task| Mutex::new(Some(task)))
        .collect();
    let next = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..thread_count {
            let spawned = thread::Builder::new()
                .name("task-worker".into())
                .spawn_scoped(scope, || loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    if index >= slots.len() {
                        break;
                    }
                    if let Some(task) = acquire(slots[index].lock()).take() {
                        task();
                    }
                });
            if spawned.is_err() {
                debug!("could not spawn task worker, continuing with fewer");
            }
        }
    });

    Ok(())
}
