use crate::core::NEXT_SYNC_ID;
use crate::core::logger;
use crate::core::mutex::CondvarMutex;
use crate::core::queue::WaitQueue;
use crate::core::sched::{CancellationPoint, InterruptDeferGuard, Scheduler};
use crate::core::thread::ThreadDescriptor;
use crate::core::types::{
    CondvarId, CondvarKind, MutexId, SyncError, SyncEvent, ThreadId, TimeSpec, WaitResolution,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// A condition variable for library-scheduled threads
///
/// A `Condvar` lets a thread atomically release a held mutex and suspend
/// until another thread signals it, then reacquire the mutex before
/// continuing. Waiters are woken in descending priority order, FIFO within a
/// priority tier. All concurrent waiters must pair the condition variable
/// with the same mutex.
///
/// The surrounding runtime supplies its scheduler and mutex through the
/// [`Scheduler`] and [`CondvarMutex`] adapters on every call; this type holds
/// no global state.
///
/// # Example
///
/// ```no_run
/// use filament::{Condvar, CondvarMutex, Scheduler};
///
/// fn consume(cv: &Condvar, sched: &dyn Scheduler, queue_mutex: &dyn CondvarMutex) {
///     // queue_mutex is held on entry; wait releases it while suspended and
///     // holds it again when it returns.
///     let resolution = cv.wait(sched, queue_mutex).expect("wait failed");
///     assert!(resolution.is_signaled());
/// }
/// ```
pub struct Condvar {
    /// Unique identifier for this condition variable
    id: CondvarId,
    /// `None` is the uninitialized sentinel; wait-family calls initialize it
    /// lazily. The lock is short-held and never survives a suspension point.
    state: Mutex<Option<CondState>>,
}

/// Initialized storage: the wait queue and the pairing invariant.
struct CondState {
    kind: CondvarKind,
    queue: WaitQueue,
    /// The single mutex every queued waiter released on enqueue. `Some` iff
    /// the queue is non-empty.
    mutex: Option<MutexId>,
}

impl CondState {
    fn standard() -> Self {
        CondState {
            kind: CondvarKind::Standard,
            queue: WaitQueue::new(),
            mutex: None,
        }
    }
}

fn next_condvar_id() -> CondvarId {
    NEXT_SYNC_ID.fetch_add(1, Ordering::SeqCst)
}

impl Condvar {
    /// Create an initialized condition variable.
    ///
    /// # Arguments
    /// * `kind` - Requested variant; `None` defaults to
    ///   [`CondvarKind::Standard`]
    ///
    /// # Errors
    /// [`SyncError::InvalidArgument`] if the requested variant is not
    /// supported.
    pub fn create(kind: Option<CondvarKind>) -> Result<Self, SyncError> {
        match kind.unwrap_or(CondvarKind::Standard) {
            CondvarKind::Standard => {}
            _ => return Err(SyncError::InvalidArgument),
        }
        let cv = Condvar {
            id: next_condvar_id(),
            state: Mutex::new(Some(CondState::standard())),
        };
        logger::log_event(None, cv.id, SyncEvent::Init, 0);
        Ok(cv)
    }

    /// Create a condition variable in the uninitialized sentinel state, the
    /// analog of a static initializer. The first `wait`/`timedwait`
    /// initializes it; signal-family operations on it fail with
    /// [`SyncError::InvalidArgument`].
    pub fn uninitialized() -> Self {
        Condvar {
            id: next_condvar_id(),
            state: Mutex::new(None),
        }
    }

    /// Get the ID of this condition variable
    pub fn id(&self) -> CondvarId {
        self.id
    }

    /// Reset an already-allocated condition variable to the empty,
    /// unassociated state without reallocating. On the sentinel this behaves
    /// as `create`.
    ///
    /// Used when a condition variable is embedded inside another primitive
    /// (a mutex's internal signaling channel) and recycled. Does not check
    /// for queued waiters.
    pub fn reinitialize(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        match state.as_mut() {
            None => *state = Some(CondState::standard()),
            Some(cond) => {
                cond.kind = CondvarKind::Standard;
                cond.queue = WaitQueue::new();
                cond.mutex = None;
            }
        }
        logger::log_event(None, self.id, SyncEvent::Reinit, 0);
        Ok(())
    }

    /// Tear the condition variable down to the sentinel state.
    ///
    /// # Errors
    /// * [`SyncError::InvalidArgument`] if already uninitialized/destroyed
    /// * [`SyncError::Busy`] if waiters are still queued; destroying under
    ///   them would leave their descriptors referencing dead state
    pub fn destroy(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        let cond = state.as_ref().ok_or(SyncError::InvalidArgument)?;
        if !cond.queue.is_empty() {
            return Err(SyncError::Busy);
        }
        *state = None;
        logger::log_event(None, self.id, SyncEvent::Destroy, 0);
        Ok(())
    }

    /// Release `mutex` and suspend until signaled, broadcast, or
    /// interrupted; the mutex is held again when this returns.
    ///
    /// The whole call is a cancellation point. If the wait is interrupted,
    /// the mutex is still reacquired (best effort) before the interruption
    /// is surfaced, and the descriptor's post-interrupt continuation is
    /// handed back in [`WaitResolution::Interrupted`] for the runtime's
    /// cancellation layer to dispatch.
    ///
    /// # Errors
    /// * [`SyncError::InvalidArgument`] if the variant is unsupported or
    ///   `mutex` differs from the mutex already associated with a non-empty
    ///   queue
    /// * any status reported by the mutex adapter's release, forwarded
    ///   verbatim (the enqueue is rolled back first)
    pub fn wait(
        &self,
        sched: &dyn Scheduler,
        mutex: &dyn CondvarMutex,
    ) -> Result<WaitResolution, SyncError> {
        let _cancel = CancellationPoint::new(sched);
        self.suspend(sched, mutex, None)?;

        let me = sched.current();
        let interrupted = me.interrupted();
        if interrupted {
            // A signaler did not dequeue us; unwind our own enqueue.
            self.remove_waiter(&me);
        }

        // POSIX contract: the mutex is reacquired before any cancellation
        // effect becomes visible to the caller.
        let relock = mutex.relock_after_wait(&me);
        if interrupted {
            logger::log_event(
                Some(me.id()),
                self.id,
                SyncEvent::WaitInterrupt,
                self.waiter_count(),
            );
            return Ok(WaitResolution::Interrupted(me.take_continuation()));
        }
        relock?;
        logger::log_event(
            Some(me.id()),
            self.id,
            SyncEvent::WaitResume,
            self.waiter_count(),
        );
        Ok(WaitResolution::Signaled)
    }

    /// As [`Condvar::wait`], giving up at `deadline`.
    ///
    /// The external scheduler resumes the caller and marks it timed out if
    /// `deadline` elapses before a signal dequeues it. Timeout and
    /// interruption both perform full queue cleanup and a best-effort mutex
    /// reacquisition whose own failure is not surfaced.
    ///
    /// # Errors
    /// * [`SyncError::InvalidArgument`] for a malformed deadline, checked
    ///   before anything else, or for the same conditions as `wait`
    /// * [`SyncError::TimedOut`] if the deadline elapsed first
    pub fn timedwait(
        &self,
        sched: &dyn Scheduler,
        mutex: &dyn CondvarMutex,
        deadline: TimeSpec,
    ) -> Result<WaitResolution, SyncError> {
        let _cancel = CancellationPoint::new(sched);
        // The one validation that must precede any queue mutation.
        if !deadline.is_valid() {
            return Err(SyncError::InvalidArgument);
        }
        self.suspend(sched, mutex, Some(deadline))?;

        let me = sched.current();
        let timed_out = me.timed_out();
        let interrupted = me.interrupted();
        if timed_out || interrupted {
            self.remove_waiter(&me);
            // Reacquisition is still mandatory here; its failure is
            // deliberately swallowed behind the timeout/interruption status.
            let _ = mutex.relock_after_wait(&me);
            if interrupted {
                logger::log_event(
                    Some(me.id()),
                    self.id,
                    SyncEvent::WaitInterrupt,
                    self.waiter_count(),
                );
                return Ok(WaitResolution::Interrupted(me.take_continuation()));
            }
            logger::log_event(
                Some(me.id()),
                self.id,
                SyncEvent::WaitTimeout,
                self.waiter_count(),
            );
            return Err(SyncError::TimedOut);
        }

        mutex.relock_after_wait(&me)?;
        logger::log_event(
            Some(me.id()),
            self.id,
            SyncEvent::WaitResume,
            self.waiter_count(),
        );
        Ok(WaitResolution::Signaled)
    }

    /// Wake the highest-priority eligible waiter, if any.
    ///
    /// Waiters already unwinding a timeout or interruption are discarded
    /// rather than woken a second time. The critical section runs with
    /// asynchronous interrupt delivery deferred; undeferring on exit may
    /// trigger a deferred yield.
    ///
    /// # Errors
    /// [`SyncError::InvalidArgument`] if uninitialized.
    pub fn signal(&self, sched: &dyn Scheduler) -> Result<(), SyncError> {
        let _defer = InterruptDeferGuard::new(sched);
        let mut state = self.state.lock();
        let cond = state.as_mut().ok_or(SyncError::InvalidArgument)?;
        if let Some(thread) = cond.queue.dequeue_eligible() {
            sched.make_runnable(&thread);
            logger::log_event(
                Some(thread.id()),
                self.id,
                SyncEvent::SignalWake,
                cond.queue.len(),
            );
        }
        if cond.queue.is_empty() {
            cond.mutex = None;
        }
        Ok(())
        // state unlocks before the defer guard drops
    }

    /// Wake every eligible waiter, leaving the queue empty and the mutex
    /// association cleared.
    ///
    /// # Errors
    /// [`SyncError::InvalidArgument`] if uninitialized.
    pub fn broadcast(&self, sched: &dyn Scheduler) -> Result<(), SyncError> {
        let _defer = InterruptDeferGuard::new(sched);
        let mut state = self.state.lock();
        let cond = state.as_mut().ok_or(SyncError::InvalidArgument)?;
        while let Some(thread) = cond.queue.dequeue_eligible() {
            sched.make_runnable(&thread);
            logger::log_event(
                Some(thread.id()),
                self.id,
                SyncEvent::BroadcastWake,
                cond.queue.len(),
            );
        }
        // Queue exhausted by construction.
        cond.mutex = None;
        Ok(())
    }

    /// True once initialized (explicitly or lazily) and not yet destroyed.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Number of currently queued waiters. Test hook.
    pub fn waiter_count(&self) -> usize {
        self.state.lock().as_ref().map_or(0, |cond| cond.queue.len())
    }

    /// Id of the currently associated mutex, if any. Test hook.
    pub fn associated_mutex(&self) -> Option<MutexId> {
        self.state.lock().as_ref().and_then(|cond| cond.mutex)
    }

    /// True if the given thread is queued here. Test hook.
    pub fn has_waiter(&self, id: ThreadId) -> bool {
        self.state
            .lock()
            .as_ref()
            .is_some_and(|cond| cond.queue.contains(id))
    }

    /// Validate, enqueue the caller, hand off the mutex, and park. Shared
    /// by `wait` and `timedwait`; `deadline` of `None` waits forever.
    fn suspend(
        &self,
        sched: &dyn Scheduler,
        mutex: &dyn CondvarMutex,
        deadline: Option<TimeSpec>,
    ) -> Result<(), SyncError> {
        let me = sched.current();
        let mut state = self.state.lock();

        let lazily_inited = state.is_none();
        let cond = state.get_or_insert_with(CondState::standard);
        if lazily_inited {
            logger::log_event(Some(me.id()), self.id, SyncEvent::Init, 0);
        }
        match cond.kind {
            CondvarKind::Standard => {}
            _ => return Err(SyncError::InvalidArgument),
        }
        // Pairing invariant: a non-empty queue pins the mutex choice.
        if cond.mutex.is_some_and(|assoc| assoc != mutex.id()) {
            return Err(SyncError::InvalidArgument);
        }

        me.reset_wait_flags();
        me.set_wakeup_deadline(deadline);
        cond.queue.enqueue(Arc::clone(&me));
        cond.mutex = Some(mutex.id());

        if let Err(err) = mutex.unlock_for_wait(&me) {
            // Cannot hand off the mutex; undo the enqueue and report the
            // adapter's status unchanged.
            cond.queue.remove(&me);
            if cond.queue.is_empty() {
                cond.mutex = None;
            }
            return Err(err);
        }
        logger::log_event(
            Some(me.id()),
            self.id,
            SyncEvent::WaitEnqueue,
            cond.queue.len(),
        );

        // One scheduler call releases the lock and parks the caller, so no
        // thread can observe the lock free while we are still runnable.
        let mut parked = Some(state);
        sched.park_current(&mut || drop(parked.take()));
        Ok(())
    }

    /// Post-resume cleanup for the timeout/interruption paths: drop our
    /// queue entry if a signaler didn't already, and release the mutex
    /// association when the queue empties.
    fn remove_waiter(&self, me: &ThreadDescriptor) {
        let mut state = self.state.lock();
        if let Some(cond) = state.as_mut() {
            cond.queue.remove(me);
            if cond.queue.is_empty() {
                cond.mutex = None;
            }
        }
    }
}

impl Default for Condvar {
    /// Equivalent to [`Condvar::uninitialized`].
    fn default() -> Self {
        Self::uninitialized()
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        if self.state.get_mut().is_some() {
            logger::log_event(None, self.id, SyncEvent::Destroy, 0);
        }
    }
}
