//! Shared harness for the integration tests: a host-OS-thread scheduler and
//! mutex standing in for the surrounding runtime. Each test OS thread plays
//! one lightweight thread; parking maps onto a per-thread park cell so the
//! atomic release-and-park contract is exercised for real.

use filament::{
    Condvar, CondvarMutex, Continuation, MutexId, Priority, Scheduler, SyncError,
    ThreadDescriptor, ThreadId, TimeSpec, WaitResolution, next_mutex_id,
};
use fxhash::FxHashMap;
use parking_lot::{Condvar as ParkCondvar, Mutex as ParkMutex};
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[allow(dead_code)]
pub const WAKE_TIMEOUT: Duration = Duration::from_secs(3);

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadDescriptor>>> = const { RefCell::new(None) };
}

/// One parked thread's handshake cell. The waiter holds `lock` from before
/// it releases the condvar's internal lock until it is inside `wakeups`, so
/// a wakeup can never slip into that window.
struct ParkCell {
    lock: ParkMutex<bool>,
    wakeups: ParkCondvar,
}

/// Host scheduler: real OS threads, per-thread park cells, and a recorded
/// wake order as the test hook for wakeup-ordering assertions.
pub struct HostScheduler {
    cells: ParkMutex<FxHashMap<ThreadId, Arc<ParkCell>>>,
    wake_order: ParkMutex<Vec<ThreadId>>,
    pending_interrupts: ParkMutex<Vec<Arc<ThreadDescriptor>>>,
    next_id: AtomicUsize,
    defer_depth: AtomicUsize,
}

impl Default for HostScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostScheduler {
    pub fn new() -> Self {
        HostScheduler {
            cells: ParkMutex::new(FxHashMap::default()),
            wake_order: ParkMutex::new(Vec::new()),
            pending_interrupts: ParkMutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            defer_depth: AtomicUsize::new(0),
        }
    }

    /// Register the calling OS thread as a lightweight thread and install it
    /// as this thread's current descriptor.
    pub fn register_current(&self, priority: Priority) -> Arc<ThreadDescriptor> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let descriptor = Arc::new(ThreadDescriptor::new(id, priority));
        self.cells.lock().insert(
            id,
            Arc::new(ParkCell {
                lock: ParkMutex::new(true),
                wakeups: ParkCondvar::new(),
            }),
        );
        CURRENT.with(|current| *current.borrow_mut() = Some(Arc::clone(&descriptor)));
        descriptor
    }

    /// Deliver an asynchronous interruption to a (parked) thread, or queue
    /// it if delivery is currently deferred.
    pub fn interrupt(&self, thread: &Arc<ThreadDescriptor>) {
        if self.defer_depth.load(Ordering::SeqCst) > 0 {
            self.pending_interrupts.lock().push(Arc::clone(thread));
            return;
        }
        self.deliver_interrupt(thread);
    }

    /// Ids in the order `make_runnable` saw them.
    pub fn wake_order(&self) -> Vec<ThreadId> {
        self.wake_order.lock().clone()
    }

    fn deliver_interrupt(&self, thread: &Arc<ThreadDescriptor>) {
        thread.set_interrupted();
        self.make_runnable(thread);
    }

    fn cell(&self, id: ThreadId) -> Arc<ParkCell> {
        Arc::clone(
            self.cells
                .lock()
                .get(&id)
                .expect("thread not registered with HostScheduler"),
        )
    }
}

impl Scheduler for HostScheduler {
    fn current(&self) -> Arc<ThreadDescriptor> {
        CURRENT.with(|current| {
            current
                .borrow()
                .clone()
                .expect("calling thread not registered with HostScheduler")
        })
    }

    fn park_current(&self, release: &mut dyn FnMut()) {
        let me = self.current();
        let cell = self.cell(me.id());
        let mut runnable = cell.lock.lock();
        *runnable = false;
        // The caller is now unwakeable-but-parked; only after that does the
        // condvar's internal lock go free.
        release();

        match me.wakeup_deadline() {
            None => {
                while !*runnable {
                    cell.wakeups.wait(&mut runnable);
                }
            }
            Some(deadline) => {
                let until = Instant::now() + deadline.remaining();
                while !*runnable {
                    if cell.wakeups.wait_until(&mut runnable, until).timed_out() {
                        // The deadline resolves this wait only if no wakeup
                        // beat it; never both.
                        if !*runnable {
                            me.set_timed_out();
                            *runnable = true;
                        }
                        break;
                    }
                }
            }
        }
    }

    fn make_runnable(&self, thread: &Arc<ThreadDescriptor>) {
        let cell = self.cell(thread.id());
        let mut runnable = cell.lock.lock();
        *runnable = true;
        cell.wakeups.notify_one();
        self.wake_order.lock().push(thread.id());
    }

    fn defer_interrupts(&self) {
        self.defer_depth.fetch_add(1, Ordering::SeqCst);
    }

    fn undefer_interrupts(&self) {
        if self.defer_depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            let pending = std::mem::take(&mut *self.pending_interrupts.lock());
            for thread in pending {
                self.deliver_interrupt(&thread);
            }
        }
    }

    fn enter_cancellation_point(&self) {}
    fn leave_cancellation_point(&self) {}
}

/// Ownership-tracking mutex adapter. `unlock_for_wait` fails with
/// `PermissionDenied` when the calling thread does not own it, which is how
/// the rollback path gets exercised end to end.
pub struct HostMutex {
    id: MutexId,
    owner: ParkMutex<Option<ThreadId>>,
    handoff: ParkCondvar,
}

impl Default for HostMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMutex {
    pub fn new() -> Self {
        HostMutex {
            id: next_mutex_id(),
            owner: ParkMutex::new(None),
            handoff: ParkCondvar::new(),
        }
    }

    pub fn acquire(&self, thread: &Arc<ThreadDescriptor>) {
        let mut owner = self.owner.lock();
        while owner.is_some() {
            self.handoff.wait(&mut owner);
        }
        *owner = Some(thread.id());
    }

    pub fn release(&self, thread: &Arc<ThreadDescriptor>) -> Result<(), SyncError> {
        let mut owner = self.owner.lock();
        if *owner != Some(thread.id()) {
            return Err(SyncError::PermissionDenied);
        }
        *owner = None;
        self.handoff.notify_one();
        Ok(())
    }

    pub fn held_by(&self, thread: &Arc<ThreadDescriptor>) -> bool {
        *self.owner.lock() == Some(thread.id())
    }
}

impl CondvarMutex for HostMutex {
    fn id(&self) -> MutexId {
        self.id
    }

    fn unlock_for_wait(&self, thread: &Arc<ThreadDescriptor>) -> Result<(), SyncError> {
        self.release(thread)
    }

    fn relock_after_wait(&self, thread: &Arc<ThreadDescriptor>) -> Result<(), SyncError> {
        self.acquire(thread);
        Ok(())
    }
}

/// A spawned lightweight waiter and the pieces a test needs to steer it.
pub struct WaiterHandle {
    pub id: ThreadId,
    pub descriptor: Arc<ThreadDescriptor>,
    pub handle: thread::JoinHandle<Result<WaitResolution, SyncError>>,
}

#[allow(dead_code)]
pub fn spawn_waiter(
    sched: &Arc<HostScheduler>,
    cv: &Arc<Condvar>,
    mutex: &Arc<HostMutex>,
    priority: Priority,
) -> WaiterHandle {
    spawn_waiter_with(sched, cv, mutex, priority, None, None)
}

#[allow(dead_code)]
pub fn spawn_timed_waiter(
    sched: &Arc<HostScheduler>,
    cv: &Arc<Condvar>,
    mutex: &Arc<HostMutex>,
    priority: Priority,
    deadline: TimeSpec,
) -> WaiterHandle {
    spawn_waiter_with(sched, cv, mutex, priority, Some(deadline), None)
}

/// Spawn an OS thread that registers, takes the mutex, and waits. On any
/// `Ok` return the waiter asserts it holds the mutex again (the reacquire
/// contract) before releasing it.
pub fn spawn_waiter_with(
    sched: &Arc<HostScheduler>,
    cv: &Arc<Condvar>,
    mutex: &Arc<HostMutex>,
    priority: Priority,
    deadline: Option<TimeSpec>,
    continuation: Option<Continuation>,
) -> WaiterHandle {
    let (tx, rx) = mpsc::channel();
    let sched = Arc::clone(sched);
    let cv = Arc::clone(cv);
    let mutex = Arc::clone(mutex);
    let handle = thread::spawn(move || {
        let me = sched.register_current(priority);
        if let Some(continuation) = continuation {
            me.set_continuation(continuation);
        }
        tx.send(Arc::clone(&me)).unwrap();

        mutex.acquire(&me);
        let result = match deadline {
            None => cv.wait(&*sched, &*mutex),
            Some(deadline) => cv.timedwait(&*sched, &*mutex, deadline),
        };
        // The mutex is held again on every resolution, including timeouts
        // and interruptions.
        assert!(mutex.held_by(&me), "wait returned without the mutex");
        mutex.release(&me).unwrap();
        result
    });
    let descriptor = rx.recv_timeout(WAKE_TIMEOUT).expect("waiter never registered");
    WaiterHandle {
        id: descriptor.id(),
        descriptor,
        handle,
    }
}

/// Poll until `cond` holds, failing the test after `WAKE_TIMEOUT`.
#[allow(dead_code)]
pub fn eventually<F: Fn() -> bool>(cond: F, what: &str) {
    let start = Instant::now();
    while !cond() {
        assert!(
            start.elapsed() < WAKE_TIMEOUT,
            "timed out waiting for {what}"
        );
        thread::sleep(Duration::from_millis(1));
    }
}
