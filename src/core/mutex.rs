use crate::core::NEXT_SYNC_ID;
use crate::core::thread::ThreadDescriptor;
use crate::core::types::{MutexId, SyncError};
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// The slice of the external mutex implementation this subsystem consumes.
///
/// A condition variable never owns its associated mutex; it releases it on
/// behalf of a thread about to park and reacquires it when the thread
/// resumes, forwarding the mutex's statuses verbatim. The mutex is expected
/// to do its own priority-aware bookkeeping inside these calls.
pub trait CondvarMutex: Send + Sync {
    /// Stable identity, used to enforce that all concurrent waiters on one
    /// condition variable paired it with the same mutex.
    fn id(&self) -> MutexId;

    /// Release the mutex for `thread`, marking the release as pending a
    /// condition wait. Fails with [`SyncError::PermissionDenied`] if the
    /// thread does not own the mutex.
    fn unlock_for_wait(&self, thread: &Arc<ThreadDescriptor>) -> Result<(), SyncError>;

    /// Reacquire the mutex for `thread` after a condition wait, blocking
    /// until it is held. Required before any timeout or cancellation effect
    /// becomes visible to the caller.
    fn relock_after_wait(&self, thread: &Arc<ThreadDescriptor>) -> Result<(), SyncError>;
}

/// Allocate a unique id for a mutex adapter.
///
/// Mutex implementations call this once at construction; condition variables
/// compare the ids to police the single-associated-mutex rule.
pub fn next_mutex_id() -> MutexId {
    NEXT_SYNC_ID.fetch_add(1, Ordering::SeqCst)
}
