//! The per-notifier background worker.
//!
//! Each enabled notifier gets its own tokio task that wakes on a fixed tick
//! and drains its queue while the notifier is enabled and within its rate
//! limit. Workers share nothing, so a stalled backend only stalls its own
//! queue. Delivery is at-most-once: a message is popped before it is sent,
//! and a failed send is logged, not retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, trace, warn};

use super::registry::{in_limits, is_enabled};
use super::runtime::WorkerHandle;
use super::senders::Notifier;
use crate::db::Store;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// How often an idle worker re-inspects its queue.
    pub tick: Duration,
    /// The window `limits` is counted over.
    pub limit_window: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            limit_window: DEFAULT_LIMIT_WINDOW,
        }
    }
}

/// Starts the worker loop for `notifier` on the current tokio runtime.
///
/// No-op (returns `false`) if a worker is already running. The running flag
/// is set before this returns.
pub fn start(notifier: Arc<dyn Notifier>, store: Arc<dyn Store>, settings: QueueSettings) -> bool {
    let runtime = notifier.runtime();
    let mut worker = runtime.worker().lock();
    if let Some(handle) = worker.as_ref() {
        if runtime.is_running() && !handle.task.is_finished() {
            return false;
        }
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    runtime.set_running(true);
    let task = tokio::spawn(run_queue(notifier.clone(), store, settings, stop_rx));
    *worker = Some(WorkerHandle { stop_tx, task });
    true
}

async fn run_queue(
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn Store>,
    settings: QueueSettings,
    mut stop_rx: watch::Receiver<bool>,
) {
    let method = notifier.method().to_string();
    info!(method = %method, tick_ms = settings.tick.as_millis() as u64, "Notifier queue worker started.");

    let mut ticker = interval(settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = stop_rx.changed() => {
                // A dropped sender means the handle was replaced or discarded.
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
        }
        if *stop_rx.borrow() {
            break;
        }
        drain_ready(notifier.as_ref(), store.as_ref(), &settings, &stop_rx).await;
    }

    info!(
        method = %method,
        remaining = notifier.runtime().queue_len(),
        "Notifier queue worker stopped."
    );
}

/// Sends queued messages, oldest first, for as long as the notifier stays
/// eligible. Returns the number of messages taken off the queue.
async fn drain_ready(
    notifier: &dyn Notifier,
    store: &dyn Store,
    settings: &QueueSettings,
    stop_rx: &watch::Receiver<bool>,
) -> usize {
    let runtime = notifier.runtime();
    let mut taken = 0;

    while !*stop_rx.borrow() {
        if runtime.queue_len() == 0 {
            break;
        }
        if !is_enabled(notifier) {
            trace!(method = notifier.method(), "Notifier disabled, deferring queue.");
            break;
        }
        if !in_limits(notifier, Utc::now(), settings.limit_window) {
            trace!(method = notifier.method(), "Notifier rate limited, deferring queue.");
            break;
        }
        let Some(message) = runtime.pop() else {
            break;
        };
        taken += 1;

        match notifier.send(&message).await {
            Ok(()) => debug!(
                method = notifier.method(),
                group = %message.group,
                "Notification sent."
            ),
            Err(e) => error!(
                method = notifier.method(),
                group = %message.group,
                error = %e,
                "Failed to send notification. Message dropped."
            ),
        }

        let sent_at = Utc::now();
        let updated = runtime.update_config(|config| config.last_sent = Some(sent_at));
        if let Err(e) = store.update_notification(updated) {
            warn!(method = notifier.method(), error = %e, "Failed to persist last sent time.");
        }
    }

    taken
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::notifications::models::QueuedMessage;
    use crate::notifications::runtime::NotifierRuntime;
    use crate::notifications::senders::SenderError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Recorder {
        runtime: NotifierRuntime,
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fail: bool) -> Arc<Self> {
            let recorder = Self {
                runtime: NotifierRuntime::new("recorder", "Recorder"),
                sent: Mutex::new(Vec::new()),
                fail,
            };
            recorder.runtime.update_config(|c| c.enabled = true);
            Arc::new(recorder)
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        fn method(&self) -> &str {
            "recorder"
        }

        fn title(&self) -> &str {
            "Recorder"
        }

        fn runtime(&self) -> &NotifierRuntime {
            &self.runtime
        }

        async fn send(&self, message: &QueuedMessage) -> Result<(), SenderError> {
            if self.fail {
                return Err(SenderError::SendFailed("backend down".to_string()));
            }
            self.sent.lock().push(message.body.clone());
            Ok(())
        }
    }

    fn store_with(notifier: &Recorder) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_notification(notifier.select()).unwrap();
        store
    }

    #[tokio::test]
    async fn test_drain_sends_in_fifo_order_and_records_last_sent() {
        let notifier = Recorder::new(false);
        let store = store_with(&notifier);
        for body in ["one", "two", "three"] {
            notifier.add_queue("service_1", body.to_string());
        }

        let (_tx, rx) = watch::channel(false);
        let taken = drain_ready(notifier.as_ref(), &store, &QueueSettings::default(), &rx).await;

        assert_eq!(taken, 3);
        assert_eq!(*notifier.sent.lock(), vec!["one", "two", "three"]);
        assert!(notifier.select().last_sent.is_some());
        assert!(store.find_notification("recorder").unwrap().last_sent.is_some());
    }

    #[tokio::test]
    async fn test_drain_respects_rate_limit() {
        let notifier = Recorder::new(false);
        notifier.runtime.update_config(|c| c.limits = 2);
        let store = store_with(&notifier);
        for body in ["one", "two"] {
            notifier.add_queue("service_1", body.to_string());
        }

        let (_tx, rx) = watch::channel(false);
        let taken = drain_ready(notifier.as_ref(), &store, &QueueSettings::default(), &rx).await;

        // The first send starts a 30s spacing window.
        assert_eq!(taken, 1);
        assert_eq!(notifier.runtime.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_drain_skips_disabled_notifier() {
        let notifier = Recorder::new(false);
        notifier.runtime.update_config(|c| c.enabled = false);
        let store = store_with(&notifier);
        notifier.add_queue("service_1", "held".to_string());

        let (_tx, rx) = watch::channel(false);
        let taken = drain_ready(notifier.as_ref(), &store, &QueueSettings::default(), &rx).await;

        assert_eq!(taken, 0);
        assert_eq!(notifier.runtime.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_drops_message() {
        let notifier = Recorder::new(true);
        let store = store_with(&notifier);
        notifier.add_queue("service_1", "lost".to_string());

        let (_tx, rx) = watch::channel(false);
        let taken = drain_ready(notifier.as_ref(), &store, &QueueSettings::default(), &rx).await;

        assert_eq!(taken, 1);
        assert_eq!(notifier.runtime.queue_len(), 0);
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_close_stops() {
        let notifier = Recorder::new(false);
        let store: Arc<dyn Store> = Arc::new(store_with(&notifier));
        let settings = QueueSettings {
            tick: Duration::from_millis(20),
            ..Default::default()
        };
        let as_dyn: Arc<dyn Notifier> = notifier.clone();

        assert!(start(as_dyn.clone(), store.clone(), settings));
        assert!(!start(as_dyn.clone(), store.clone(), settings));
        assert!(notifier.is_running());

        notifier.add_queue("service_1", "hello".to_string());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*notifier.sent.lock(), vec!["hello"]);

        notifier.close();
        assert!(!notifier.is_running());
        notifier.close();
        assert!(!notifier.is_running());

        // Restart after close spawns a fresh worker.
        assert!(start(as_dyn, store, settings));
        assert!(notifier.is_running());
        notifier.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_running_flag_tracks_worker_under_concurrent_start_close() {
        let notifier = Recorder::new(false);
        let store: Arc<dyn Store> = Arc::new(store_with(&notifier));
        let as_dyn: Arc<dyn Notifier> = notifier.clone();
        let handle = tokio::runtime::Handle::current();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let _guard = handle.enter();
                for _ in 0..200 {
                    start(as_dyn.clone(), store.clone(), QueueSettings::default());
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    notifier.close();
                }
            });
        });

        let has_worker = notifier.runtime.worker().lock().is_some();
        assert_eq!(notifier.is_running(), has_worker);
        notifier.close();
        assert!(!notifier.is_running());
    }
}
