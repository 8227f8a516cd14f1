//! Deferred cleanup queue.
//!
//! GPU objects cannot be destroyed while submitted work may still reference
//! them. Destruction is therefore enqueued as a closure and drained later, at
//! a point where the device is known idle. The queue is two-phase: `enqueue`
//! is cheap and callable from anywhere (including from inside a draining
//! task), `drain` runs the accumulated closures.

use std::sync::Arc;

use parking_lot::Mutex;

type CleanupTask = Box<dyn FnOnce() + Send>;

/// Listener invoked after a drain that ran at least one task.
pub type CleanupListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub(crate) struct CleanupQueue {
    pending: Mutex<Vec<CleanupTask>>,
    listeners: Mutex<Vec<CleanupListener>>,
}

impl CleanupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task for the next drain.
    pub fn enqueue(&self, task: CleanupTask) {
        self.pending.lock().push(task);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Register a listener notified after each non-empty drain.
    pub fn add_listener(&self, listener: CleanupListener) {
        self.listeners.lock().push(listener);
    }

    /// Run all pending tasks, including those enqueued by running tasks.
    ///
    /// Returns the number of tasks executed. The pending lock is not held
    /// while tasks run, so tasks may enqueue further cleanup.
    pub fn drain(&self) -> usize {
        let mut executed = 0;
        loop {
            let batch = std::mem::take(&mut *self.pending.lock());
            if batch.is_empty() {
                break;
            }
            executed += batch.len();
            for task in batch {
                task();
            }
        }
        if executed > 0 {
            let listeners = self.listeners.lock().clone();
            for listener in listeners {
                listener();
            }
        }
        executed
    }
}
