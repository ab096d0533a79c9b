//! Per-notifier in-memory state: the outbound queue, the running flag, the
//! live config and the handle of the background worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::models::{NotificationConfig, QueuedMessage};

#[derive(Debug)]
pub(crate) struct WorkerHandle {
    pub(crate) stop_tx: watch::Sender<bool>,
    pub(crate) task: JoinHandle<()>,
}

/// Owned exclusively by one notifier. Outside code reaches the queue only
/// through `push` (via `Notifier::add_queue`) and the worker lifecycle.
#[derive(Debug)]
pub struct NotifierRuntime {
    queue: Mutex<VecDeque<QueuedMessage>>,
    running: AtomicBool,
    config: RwLock<NotificationConfig>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl NotifierRuntime {
    pub fn new(method: &str, title: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(false),
            config: RwLock::new(NotificationConfig::new(method, title)),
            worker: Mutex::new(None),
        }
    }

    pub fn push(&self, message: QueuedMessage) {
        self.queue.lock().push_back(message);
    }

    /// Removes and returns the oldest queued message.
    pub fn pop(&self) -> Option<QueuedMessage> {
        self.queue.lock().pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// A copy of the pending messages, oldest first.
    pub fn queued(&self) -> Vec<QueuedMessage> {
        self.queue.lock().iter().cloned().collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn config(&self) -> NotificationConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: NotificationConfig) {
        *self.config.write() = config;
    }

    /// Applies `f` to the live config under the write lock and returns the
    /// updated copy.
    pub(crate) fn update_config(
        &self,
        f: impl FnOnce(&mut NotificationConfig),
    ) -> NotificationConfig {
        let mut guard = self.config.write();
        f(&mut guard);
        guard.clone()
    }

    pub(crate) fn worker(&self) -> &Mutex<Option<WorkerHandle>> {
        &self.worker
    }

    /// Signals the worker loop to stop and marks the runtime stopped.
    ///
    /// Returns without waiting for the loop to exit; a send already in
    /// flight completes. Queued messages are left in place. Returns `false`
    /// when there was no worker to stop.
    pub fn close(&self) -> bool {
        let mut worker = self.worker.lock();
        // `running` and the handle only change together, under this lock.
        self.set_running(false);
        match worker.take() {
            Some(handle) => {
                // The loop may already be gone; a dropped receiver is fine.
                let _ = handle.stop_tx.send(true);
                true
            }
            None => false,
        }
    }
}
