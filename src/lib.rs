//! # Filament
//!
//! The condition-variable subsystem of a user-level (library-scheduled)
//! threading runtime.
//!
//! Filament implements the hard part of such a runtime: letting a thread
//! atomically release a held mutex and suspend until another thread notifies
//! it, while a shared priority-ordered wait queue stays consistent under four
//! independently-triggered resume paths (normal wakeup, timeout,
//! interruption, and external signal delivery).
//!
//! ## Features
//!
//! - Priority-ordered wait queues (descending priority, FIFO within a tier)
//! - Timed waits with absolute deadlines
//! - Interruption-safe queue cleanup with mandatory mutex reacquisition
//! - Explicit scheduler and mutex adapter seams for the surrounding runtime
//! - Wait/wake event logging
//!
//! The scheduler itself (run queue, context switching, timer wakeups) and the
//! mutex implementation are external collaborators consumed through the
//! [`Scheduler`] and [`CondvarMutex`] traits.

mod core;
pub use core::{
    Filament, init_logger,
    condvar::Condvar,
    mutex::{CondvarMutex, next_mutex_id},
    sched::{CancellationPoint, InterruptDeferGuard, Scheduler},
    thread::ThreadDescriptor,
    types::{
        CondvarId, CondvarKind, Continuation, MutexId, Priority, SyncError, SyncEvent, ThreadId,
        TimeSpec, WaitResolution,
    },
};
