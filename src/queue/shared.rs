// Reader/writer lifetime roles for a shared queue
//
// The queue state is shared; writers additionally share a terminator whose
// drop (when the last writer goes away) finishes the queue, so blocked and
// future reader pops drain to `Empty` instead of hanging forever.

use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

use crate::queue::BoundedQueue;

struct Terminator<T> {
    state: Arc<BoundedQueue<T>>,
}

impl<T> Drop for Terminator<T> {
    fn drop(&mut self) {
        debug!("last queue writer released, finishing queue");
        self.state.notify_to_finish();
    }
}

/// Consumer handle to a shared queue.
///
/// Readers only share the state; they never finish the queue. Obtain one
/// from [`QueueWriter::as_reader`] and clone it freely.
pub struct QueueReader<T> {
    state: Arc<BoundedQueue<T>>,
}

impl<T> Clone for QueueReader<T> {
    fn clone(&self) -> Self {
        QueueReader {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Deref for QueueReader<T> {
    type Target = BoundedQueue<T>;

    fn deref(&self) -> &BoundedQueue<T> {
        &self.state
    }
}

/// Producer handle to a shared queue.
///
/// Cloning a writer increments the writer count; when the last writer is
/// released, the queue is finished exactly once. A writer can also act as
/// a reader (it derefs to the full queue API).
pub struct QueueWriter<T> {
    reader: QueueReader<T>,
    terminator: Arc<Terminator<T>>,
}

impl<T> QueueWriter<T> {
    pub fn new(capacity: usize) -> Self {
        Self::with_state(Arc::new(BoundedQueue::new(capacity)))
    }

    pub fn unbounded() -> Self {
        Self::with_state(Arc::new(BoundedQueue::unbounded()))
    }

    fn with_state(state: Arc<BoundedQueue<T>>) -> Self {
        QueueWriter {
            reader: QueueReader {
                state: Arc::clone(&state),
            },
            terminator: Arc::new(Terminator { state }),
        }
    }

    /// Clone the reader role without touching the writer count.
    pub fn as_reader(&self) -> QueueReader<T> {
        self.reader.clone()
    }
}

impl<T> Clone for QueueWriter<T> {
    fn clone(&self) -> Self {
        QueueWriter {
            reader: self.reader.clone(),
            terminator: Arc::clone(&self.terminator),
        }
    }
}

impl<T> Deref for QueueWriter<T> {
    type Target = BoundedQueue<T>;

    fn deref(&self) -> &BoundedQueue<T> {
        &self.reader.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PopResult;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn reader_outlives_writer() {
        let writer = QueueWriter::unbounded();
        assert!(writer.push("A"));
        assert!(writer.push("B"));

        let reader = writer.as_reader();
        drop(writer);

        assert_eq!(reader.pop().value(), Some("A"));
        assert_eq!(reader.pop().value(), Some("B"));
        assert_eq!(reader.pop(), PopResult::Empty);
        assert!(reader.is_done());
    }

    #[test]
    fn cloned_writer_keeps_queue_open() {
        let writer = QueueWriter::unbounded();
        let second = writer.clone();
        let reader = writer.as_reader();

        drop(writer);
        assert!(!reader.is_done());
        assert!(second.push(1));

        drop(second);
        assert!(reader.is_done());
        assert_eq!(reader.pop().value(), Some(1));
        assert_eq!(reader.pop(), PopResult::Empty);
    }

    #[test]
    fn extracting_readers_does_not_finish() {
        let writer = QueueWriter::<i32>::unbounded();
        let reader = writer.as_reader();
        let another = reader.clone();
        drop(reader);
        drop(another);
        assert!(!writer.is_done());
    }

    #[test]
    fn blocked_reader_released_by_last_writer() {
        let writer = QueueWriter::<i32>::unbounded();
        let reader = writer.as_reader();
        let consumer = thread::spawn(move || reader.pop());
        thread::sleep(Duration::from_millis(20));
        drop(writer);
        assert_eq!(consumer.join().unwrap(), PopResult::Empty);
    }

    #[test]
    fn readers_observe_pushes_from_all_writers() {
        let writer = QueueWriter::unbounded();
        let second = writer.clone();
        let reader = writer.as_reader();

        let producers = vec![
            thread::spawn(move || {
                for i in 0..10 {
                    writer.push(i);
                }
            }),
            thread::spawn(move || {
                for i in 10..20 {
                    second.push(i);
                }
            }),
        ];

        let mut seen = Vec::new();
        loop {
            match reader.pop() {
                PopResult::Valid(value) => seen.push(value),
                _ => break,
            }
        }
        for producer in producers {
            producer.join().unwrap();
        }

        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }
}
