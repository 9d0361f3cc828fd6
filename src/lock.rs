// Poison-tolerant lock acquisition
//
// A panic in a user callback must not wedge an unrelated primitive, so
// internal locks recover the guard from a poisoned mutex. The panic itself
// still propagates by whatever policy the owning component documents.

use std::sync::{LockResult, PoisonError};

pub(crate) fn acquire<T>(result: LockResult<T>) -> T {
    result.unwrap_or_else(PoisonError::into_inner)
}
