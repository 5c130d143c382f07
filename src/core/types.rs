use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Thread identifier type
///
/// Uniquely identifies a lightweight thread managed by the external
/// scheduler. The scheduler assigns ids; this subsystem only compares them.
pub type ThreadId = usize;

/// Mutex identifier type
///
/// Uniquely identifies a mutex adapter. Used to enforce the
/// single-associated-mutex rule without holding a reference to the mutex.
pub type MutexId = usize;

/// Condition variable identifier type
pub type CondvarId = usize;

/// Scheduling priority of a thread; higher values are woken first.
pub type Priority = u32;

/// Callback handed back to the runtime after an interrupted wait finishes
/// unwinding. The caller's scheduler layer dispatches it; this subsystem
/// never invokes it.
pub type Continuation = Box<dyn FnOnce(ThreadId) + Send>;

/// Variant of a condition variable requested at creation time.
///
/// Only [`CondvarKind::Standard`] is functionally supported. `Counting` is
/// reserved and rejected with [`SyncError::InvalidArgument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondvarKind {
    /// The plain condition variable: priority-ordered queue, one associated
    /// mutex, no state of its own.
    Standard,
    /// Reserved. Not supported.
    Counting,
}

/// Status domain of the condition-variable operations.
///
/// Mutex-adapter statuses are reported through the same enum and forwarded
/// verbatim by the wait paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// Null/uninitialized handle, unsupported variant, mutex mismatch,
    /// or malformed deadline.
    InvalidArgument,
    /// Allocation failure during create. Unreachable while allocation is
    /// infallible; kept for status-domain compatibility.
    OutOfMemory,
    /// A timed wait's deadline elapsed before a wakeup.
    TimedOut,
    /// The operation would tear down state that still has waiters queued on
    /// it (destroy on a non-empty queue).
    Busy,
    /// Reported by mutex adapters when the calling thread does not own the
    /// mutex it is releasing.
    PermissionDenied,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SyncError::InvalidArgument => "invalid argument",
            SyncError::OutOfMemory => "out of memory",
            SyncError::TimedOut => "wait timed out",
            SyncError::Busy => "waiters still queued",
            SyncError::PermissionDenied => "caller does not own the mutex",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for SyncError {}

/// How a wait resolved, from the caller's point of view.
///
/// Timeouts are reported as `Err(SyncError::TimedOut)` instead; by the time a
/// wait resolves, the mutex reacquisition contract has already been honored.
pub enum WaitResolution {
    /// A signal or broadcast woke this thread; the mutex is held again.
    Signaled,
    /// The wait was interrupted. The mutex reacquisition was attempted and
    /// the descriptor's post-interrupt continuation, if any, is handed back
    /// for the runtime's cancellation layer to dispatch.
    Interrupted(Option<Continuation>),
}

impl fmt::Debug for WaitResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitResolution::Signaled => f.write_str("Signaled"),
            WaitResolution::Interrupted(cont) => f
                .debug_tuple("Interrupted")
                .field(&cont.as_ref().map(|_| "continuation"))
                .finish(),
        }
    }
}

impl WaitResolution {
    /// True if this wait was resolved by a signal or broadcast.
    pub fn is_signaled(&self) -> bool {
        matches!(self, WaitResolution::Signaled)
    }

    /// True if this wait was resolved by an interruption.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, WaitResolution::Interrupted(_))
    }
}

/// An absolute wakeup deadline: seconds and nanoseconds since the UNIX epoch.
///
/// A deadline is well formed iff `sec` is non-negative and `nsec` is in
/// `[0, 1_000_000_000)`. Malformed deadlines are rejected by `timedwait`
/// before any queue mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpec {
    pub sec: i64,
    pub nsec: i64,
}

impl TimeSpec {
    /// Build a deadline from raw seconds/nanoseconds. Not validated here.
    pub fn new(sec: i64, nsec: i64) -> Self {
        TimeSpec { sec, nsec }
    }

    /// Check the well-formedness bounds: non-negative seconds, nanoseconds
    /// in `[0, 1_000_000_000)`.
    pub fn is_valid(&self) -> bool {
        self.sec >= 0 && (0..1_000_000_000).contains(&self.nsec)
    }

    /// An already-valid deadline `delay` from now. Convenience for timed
    /// waits relative to the current wall clock.
    pub fn after(delay: Duration) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let target = now + delay;
        TimeSpec {
            sec: target.as_secs() as i64,
            nsec: target.subsec_nanos() as i64,
        }
    }

    /// How much wall-clock time remains until this deadline. Zero if the
    /// deadline already passed. Callers must validate first.
    pub fn remaining(&self) -> Duration {
        let target = Duration::new(
            self.sec.max(0) as u64,
            self.nsec.rem_euclid(1_000_000_000) as u32,
        );
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        target.saturating_sub(now)
    }
}

/// Represents the type of condition-variable event that occurred
///
/// These events trace the lifecycle of condition variables and the wait,
/// wake, timeout, and interruption transitions of their waiters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncEvent {
    /// A condition variable was created or lazily initialized
    Init,
    /// A condition variable was reset for reuse
    Reinit,
    /// A condition variable was destroyed
    Destroy,
    /// A thread enqueued itself and suspended
    WaitEnqueue,
    /// A signal dequeued and woke a thread
    SignalWake,
    /// A broadcast dequeued and woke a thread
    BroadcastWake,
    /// A wait resumed normally, mutex reacquired
    WaitResume,
    /// A timed wait's deadline elapsed
    WaitTimeout,
    /// A wait was interrupted and unwound
    WaitInterrupt,
}
