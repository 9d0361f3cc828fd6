// Error types for the rendezvous primitives

use thiserror::Error;

/// The error type for precondition violations.
///
/// Timeouts are never reported through this type; every timed operation
/// returns a distinguishable value instead (`false` for boolean waits,
/// [`PopResult::Timeout`](crate::queue::PopResult) for queue pops).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A latch (or a barrier cycle) was counted down past zero.
    #[error("latch already released")]
    LatchReleased,
}

/// Result type for all fallible operations
pub type Result<T> = std::result::Result<T, Error>;
