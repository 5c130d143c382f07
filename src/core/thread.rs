use crate::core::types::{Continuation, Priority, ThreadId, TimeSpec};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The slice of a lightweight thread's state that the condition-variable
/// subsystem reads and writes.
///
/// The descriptor is owned by the external scheduler and shared with this
/// subsystem as an `Arc`. The scheduler sets `timed_out` when a parked
/// thread's deadline elapses and `interrupted` when it delivers an
/// asynchronous cancellation; the condition variable only observes those
/// flags on resume.
///
/// `in_cond_queue` records wait-queue membership so that removal stays
/// idempotent when a signaler's dequeue races a timeout or interruption.
pub struct ThreadDescriptor {
    /// Scheduler-assigned identity
    id: ThreadId,
    /// Scheduling priority; read-only in this subsystem
    priority: AtomicU32,
    /// Set while the thread sits on some condition variable's wait queue
    in_cond_queue: AtomicBool,
    /// Set by the scheduler when a timed park's deadline elapses
    timed_out: AtomicBool,
    /// Set by the scheduler when the thread is interrupted while parked
    interrupted: AtomicBool,
    /// Absolute wakeup deadline for the current wait; `None` waits forever
    wakeup_deadline: Mutex<Option<TimeSpec>>,
    /// Dispatched by the runtime's cancellation layer after an interrupted
    /// wait finishes unwinding
    continuation: Mutex<Option<Continuation>>,
}

impl ThreadDescriptor {
    /// Create a descriptor for a thread the scheduler is registering.
    pub fn new(id: ThreadId, priority: Priority) -> Self {
        ThreadDescriptor {
            id,
            priority: AtomicU32::new(priority),
            in_cond_queue: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            wakeup_deadline: Mutex::new(None),
            continuation: Mutex::new(None),
        }
    }

    /// Scheduler-assigned identity of this thread.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Current scheduling priority.
    pub fn priority(&self) -> Priority {
        self.priority.load(Ordering::SeqCst)
    }

    /// Adjust the priority. Exposed for the scheduler; the wait queue only
    /// reads it.
    pub fn set_priority(&self, priority: Priority) {
        self.priority.store(priority, Ordering::SeqCst);
    }

    /// True while this thread sits on a condition variable's wait queue.
    pub fn in_cond_queue(&self) -> bool {
        self.in_cond_queue.load(Ordering::SeqCst)
    }

    pub(crate) fn set_in_cond_queue(&self, member: bool) {
        self.in_cond_queue.store(member, Ordering::SeqCst);
    }

    /// True if the scheduler timed out this thread's last park.
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    /// Mark this thread's park as timed out. Called by the scheduler, never
    /// by the condition variable.
    pub fn set_timed_out(&self) {
        self.timed_out.store(true, Ordering::SeqCst);
    }

    /// True if the scheduler interrupted this thread's last park.
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Mark this thread as interrupted. Called by the scheduler's delivery
    /// path, never by the condition variable.
    pub fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    /// Clear the timeout/interruption flags before a fresh wait.
    pub(crate) fn reset_wait_flags(&self) {
        self.timed_out.store(false, Ordering::SeqCst);
        self.interrupted.store(false, Ordering::SeqCst);
    }

    /// The absolute deadline of the current wait, if any.
    pub fn wakeup_deadline(&self) -> Option<TimeSpec> {
        *self.wakeup_deadline.lock()
    }

    pub(crate) fn set_wakeup_deadline(&self, deadline: Option<TimeSpec>) {
        *self.wakeup_deadline.lock() = deadline;
    }

    /// Install the callback to hand back if a wait on this thread is
    /// interrupted.
    pub fn set_continuation(&self, continuation: Continuation) {
        *self.continuation.lock() = Some(continuation);
    }

    /// Take the post-interrupt continuation, leaving none behind.
    pub(crate) fn take_continuation(&self) -> Option<Continuation> {
        self.continuation.lock().take()
    }
}

impl fmt::Debug for ThreadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadDescriptor")
            .field("id", &self.id)
            .field("priority", &self.priority())
            .field("in_cond_queue", &self.in_cond_queue())
            .field("timed_out", &self.timed_out())
            .field("interrupted", &self.interrupted())
            .finish()
    }
}
