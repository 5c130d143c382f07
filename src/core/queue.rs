use crate::core::thread::ThreadDescriptor;
use crate::core::types::ThreadId;
use std::collections::VecDeque;
use std::sync::Arc;

/// The wait queue of a single condition variable.
///
/// Ordered by descending scheduling priority with FIFO tie-break; the order
/// is re-established on every insertion, never deferred. Callers hold the
/// owning condition variable's lock around every operation here.
#[derive(Default)]
pub struct WaitQueue {
    threads: VecDeque<Arc<ThreadDescriptor>>,
}

impl WaitQueue {
    pub fn new() -> Self {
        WaitQueue {
            threads: VecDeque::new(),
        }
    }

    /// Insert a thread in descending-priority, FIFO-within-tier order and
    /// mark its queue membership.
    ///
    /// For the common case of all threads having equal priority, a quick
    /// check against the tail keeps insertion O(1); otherwise the queue is
    /// scanned from the head for the first strictly-lower priority.
    pub fn enqueue(&mut self, thread: Arc<ThreadDescriptor>) {
        debug_assert!(!thread.in_cond_queue(), "thread already queued");

        thread.set_in_cond_queue(true);
        let fits_at_tail = self
            .threads
            .back()
            .is_none_or(|tail| thread.priority() <= tail.priority());
        if fits_at_tail {
            self.threads.push_back(thread);
            return;
        }
        let at = self
            .threads
            .iter()
            .position(|queued| queued.priority() < thread.priority())
            .unwrap_or(self.threads.len());
        self.threads.insert(at, thread);
    }

    /// Remove waiters from the head until one is found that has not already
    /// timed out or been interrupted, and return it.
    ///
    /// Flagged waiters are discarded here; their own wait path is already
    /// unwinding them and they must not be woken a second time. Membership
    /// flags are cleared for every removed entry.
    pub fn dequeue_eligible(&mut self) -> Option<Arc<ThreadDescriptor>> {
        while let Some(thread) = self.threads.pop_front() {
            thread.set_in_cond_queue(false);
            if !thread.timed_out() && !thread.interrupted() {
                return Some(thread);
            }
        }
        None
    }

    /// Unlink a thread if it is still a member; otherwise do nothing.
    ///
    /// A waiter can race between being dequeued by a signaler and removing
    /// itself after a timeout or interruption, so this must stay idempotent.
    pub fn remove(&mut self, thread: &ThreadDescriptor) {
        if !thread.in_cond_queue() {
            return;
        }
        if let Some(at) = self.threads.iter().position(|queued| queued.id() == thread.id()) {
            self.threads.remove(at);
        }
        thread.set_in_cond_queue(false);
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// True if the given thread id is currently queued. Test hook.
    pub fn contains(&self, id: ThreadId) -> bool {
        self.threads.iter().any(|queued| queued.id() == id)
    }

    /// Queued thread ids in wakeup order. Test hook.
    pub fn order(&self) -> Vec<ThreadId> {
        self.threads.iter().map(|queued| queued.id()).collect()
    }
}
