// Higher-level invocation patterns built on the primitives

mod bulk;
mod repeat;
mod tasks;

pub use bulk::{
    for_each, invoke_async, invoke_on_each, invoke_threads, run_threads, InvokedValues,
    TaskFuture,
};
pub use repeat::{repeat, repeat_until, RepeatGuard};
pub use tasks::{run_tasks, Task};
