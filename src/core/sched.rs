use crate::core::thread::ThreadDescriptor;
use std::sync::Arc;

/// The slice of the external scheduler this subsystem consumes.
///
/// The runtime passes its scheduler into every condition-variable operation
/// explicitly; there is no process-global current-thread pointer.
///
/// # Contract
///
/// - `park_current` must invoke `release` exactly once, after the caller is
///   published as suspended in the condition-wait state and before the call
///   blocks, so that no other thread can observe the condition variable's
///   lock released while the caller is still runnable. If the descriptor
///   carries a wakeup deadline, the scheduler must resume the thread when it
///   elapses and set its `timed_out` flag, but only if the thread was not
///   already made runnable, so that at most one of {wakeup, timeout,
///   interruption} resolves a given wait.
/// - `make_runnable` transitions a parked thread back to runnable. Waking a
///   thread that is already runnable must be harmless.
/// - `defer_interrupts`/`undefer_interrupts` bracket a region during which
///   asynchronous interrupt-driven scheduler activity is postponed;
///   undeferring delivers anything pending and may yield.
pub trait Scheduler: Send + Sync {
    /// Descriptor of the thread invoking the current operation.
    fn current(&self) -> Arc<ThreadDescriptor>;

    /// Atomically release the condition variable's internal lock (by calling
    /// `release`) and park the calling thread in the condition-wait state.
    /// Returns when the thread has been resumed.
    fn park_current(&self, release: &mut dyn FnMut());

    /// Transition a previously parked thread back to runnable.
    fn make_runnable(&self, thread: &Arc<ThreadDescriptor>);

    /// Begin deferring asynchronous interrupt delivery for the caller.
    fn defer_interrupts(&self);

    /// End the deferral region, delivering pending interrupts.
    fn undefer_interrupts(&self);

    /// Mark the caller as a valid target for asynchronous cancellation.
    fn enter_cancellation_point(&self);

    /// Close the cancellation-eligible region opened by
    /// [`Scheduler::enter_cancellation_point`].
    fn leave_cancellation_point(&self);
}

/// Scoped deferral of asynchronous interrupt delivery.
///
/// Signal and broadcast mutate the wait queue inside one of these so that
/// interrupt-driven scheduler activity cannot observe it mid-mutation. The
/// guard undefers on drop, which covers every exit path including early
/// error returns.
pub struct InterruptDeferGuard<'a> {
    sched: &'a dyn Scheduler,
}

impl<'a> InterruptDeferGuard<'a> {
    pub fn new(sched: &'a dyn Scheduler) -> Self {
        sched.defer_interrupts();
        InterruptDeferGuard { sched }
    }
}

impl Drop for InterruptDeferGuard<'_> {
    fn drop(&mut self) {
        self.sched.undefer_interrupts();
    }
}

/// Scoped cancellation-eligible region.
///
/// Wait and timed wait are cancellation points: the calling thread may be
/// interrupted for their whole duration. Closing the region on drop keeps
/// the bracket balanced across error returns.
pub struct CancellationPoint<'a> {
    sched: &'a dyn Scheduler,
}

impl<'a> CancellationPoint<'a> {
    pub fn new(sched: &'a dyn Scheduler) -> Self {
        sched.enter_cancellation_point();
        CancellationPoint { sched }
    }
}

impl Drop for CancellationPoint<'_> {
    fn drop(&mut self) {
        self.sched.leave_cancellation_point();
    }
}
