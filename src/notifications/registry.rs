//! The set of notification backends known to this process.
//!
//! Built once at startup and handed to the dispatcher by reference, so tests
//! can construct isolated registries. Also owns the bridge between a
//! backend's live config and its persisted row.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use super::error::NotificationError;
use super::models::NotificationConfig;
use super::queue::{self, QueueSettings};
use super::senders::Notifier;
use crate::db::Store;

pub struct NotifierRegistry {
    store: Arc<dyn Store>,
    settings: QueueSettings,
    // Registration order; dispatch walks this list front to back.
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl NotifierRegistry {
    pub fn new(store: Arc<dyn Store>, settings: QueueSettings) -> Self {
        Self {
            store,
            settings,
            notifiers: RwLock::new(Vec::new()),
        }
    }

    /// Adds a backend, loading its persisted config.
    ///
    /// On first run there is no row yet, so a disabled default row is
    /// created. If the loaded config is enabled the worker is started, which
    /// requires a tokio runtime.
    pub fn register(&self, notifier: Arc<dyn Notifier>) -> Result<(), NotificationError> {
        let method = notifier.method().to_string();
        if self.find(&method).is_some() {
            return Err(NotificationError::AlreadyRegistered(method));
        }

        let config = match self.select_notification(notifier.as_ref()) {
            Ok(config) => config,
            Err(NotificationError::StoreError(e)) if e.is_not_found() => {
                info!(method = %method, "No stored config for notifier, creating default.");
                self.store
                    .create_notification(NotificationConfig::new(&method, notifier.title()))?
            }
            Err(e) => return Err(e),
        };

        let enabled = config.enabled;
        notifier.runtime().set_config(config);
        self.notifiers.write().push(notifier.clone());

        if enabled {
            queue::start(notifier, self.store.clone(), self.settings);
        }
        info!(method = %method, enabled, "Notifier registered.");
        Ok(())
    }

    /// Snapshot of the registered notifiers, in registration order.
    pub fn notifiers(&self) -> Vec<Arc<dyn Notifier>> {
        self.notifiers.read().clone()
    }

    fn find(&self, method: &str) -> Option<Arc<dyn Notifier>> {
        self.notifiers
            .read()
            .iter()
            .find(|n| n.method() == method)
            .cloned()
    }

    /// Resolves a registered backend and its live config by method name.
    pub fn select_notifier(
        &self,
        method: &str,
    ) -> Result<(Arc<dyn Notifier>, NotificationConfig), NotificationError> {
        let notifier = self
            .find(method)
            .ok_or_else(|| NotificationError::NotFound(method.to_string()))?;
        let config = notifier.select();
        Ok((notifier, config))
    }

    /// Loads the persisted config row for `notifier`.
    pub fn select_notification(
        &self,
        notifier: &dyn Notifier,
    ) -> Result<NotificationConfig, NotificationError> {
        Ok(self.store.find_notification(notifier.method())?)
    }

    /// Persists `config` as the notifier's settings and applies it: the live
    /// copy is swapped and the worker is started or closed to match
    /// `enabled`. Does not run the `on_save` hook; see [`Self::save`].
    pub fn update(
        &self,
        notifier: &Arc<dyn Notifier>,
        mut config: NotificationConfig,
    ) -> Result<NotificationConfig, NotificationError> {
        config.method = notifier.method().to_string();
        let stored = self.store.update_notification(config)?;
        notifier.runtime().set_config(stored.clone());

        if stored.enabled {
            if queue::start(notifier.clone(), self.store.clone(), self.settings) {
                info!(method = notifier.method(), "Notifier enabled.");
            }
        } else if notifier.runtime().close() {
            info!(method = notifier.method(), "Notifier disabled.");
        }
        Ok(stored)
    }

    /// The configuration-save path: runs the backend's `on_save` hook on the
    /// candidate `config` and only persists and applies it when the hook
    /// accepts. The hook's error is returned as-is.
    pub fn save(
        &self,
        notifier: &Arc<dyn Notifier>,
        mut config: NotificationConfig,
    ) -> Result<NotificationConfig, NotificationError> {
        config.method = notifier.method().to_string();
        if let Err(e) = notifier.on_save(&config) {
            warn!(method = notifier.method(), error = %e, "Notifier rejected configuration.");
            return Err(e.into());
        }
        self.update(notifier, config)
    }

    /// Runs a backend's self-test, bypassing its queue.
    pub async fn test(&self, method: &str) -> Result<(), NotificationError> {
        let (notifier, _) = self.select_notifier(method)?;
        let tester = notifier
            .tester()
            .ok_or_else(|| NotificationError::TestUnsupported(method.to_string()))?;
        tester.on_test().await?;
        Ok(())
    }

    /// Stops every worker. Pending messages are left queued and are lost
    /// when the process exits.
    pub fn close_all(&self) {
        for notifier in self.notifiers() {
            if notifier.runtime().close() {
                info!(
                    method = notifier.method(),
                    pending = notifier.runtime().queue_len(),
                    "Notifier closed."
                );
            }
        }
    }
}

pub fn is_enabled(notifier: &dyn Notifier) -> bool {
    notifier.runtime().config().enabled
}

/// Whether `notifier` may send at `now`.
///
/// `limits` is the number of sends allowed per `window`, spread evenly: a
/// send is allowed once `window / limits` has passed since the last one.
/// Zero or negative `limits` disables limiting, and a notifier that never
/// sent is always within limits.
pub fn in_limits(notifier: &dyn Notifier, now: DateTime<Utc>, window: Duration) -> bool {
    let config = notifier.runtime().config();
    if config.limits <= 0 {
        return true;
    }
    if config.last_sent.is_none() {
        return true;
    }

    let spacing = window / u32::try_from(config.limits).unwrap_or(u32::MAX);
    match config.last_sent_elapsed(now).to_std() {
        Ok(elapsed) => elapsed >= spacing,
        // last_sent lies in the future; wait for the clock to catch up.
        Err(_) => false,
    }
}
