use async_trait::async_trait;
use thiserror::Error;

use super::models::{NotificationConfig, QueuedMessage};
use super::runtime::NotifierRuntime;
use crate::db::models::{Failure, Service, User};

pub mod telegram;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
}

/// The core contract every registered notification backend satisfies.
///
/// A backend owns a [`NotifierRuntime`] holding its queue, running flag and
/// the live copy of its persisted config; the provided methods operate on
/// that runtime. Optional event hooks are exposed through the capability
/// accessors at the bottom, which default to `None`. The dispatcher asks
/// each notifier for a capability instead of assuming one.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Unique method name, the key of the persisted config row.
    fn method(&self) -> &str;

    /// Human-readable name used for the first-run config row.
    fn title(&self) -> &str;

    fn runtime(&self) -> &NotifierRuntime;

    /// Delivers one message through the backend. Called by the worker loop
    /// only; event hooks must enqueue with [`Notifier::add_queue`] instead.
    async fn send(&self, message: &QueuedMessage) -> Result<(), SenderError>;

    /// Appends a message to this notifier's queue, whether or not its worker
    /// is running.
    fn add_queue(&self, group: &str, message: String) {
        self.runtime().push(QueuedMessage::new(group, message));
    }

    fn is_running(&self) -> bool {
        self.runtime().is_running()
    }

    /// Stops the background worker. Idempotent; pending messages stay queued.
    fn close(&self) {
        self.runtime().close();
    }

    /// A snapshot of the live config.
    fn select(&self) -> NotificationConfig {
        self.runtime().config()
    }

    fn get_value(&self, field: &str) -> String {
        self.runtime().config().get_value(field)
    }

    /// Validation hook run against a candidate config before it is
    /// persisted or applied.
    fn on_save(&self, _config: &NotificationConfig) -> Result<(), SenderError> {
        Ok(())
    }

    fn basic_events(&self) -> Option<&dyn BasicEvents> {
        None
    }

    fn service_events(&self) -> Option<&dyn ServiceEvents> {
        None
    }

    fn user_events(&self) -> Option<&dyn UserEvents> {
        None
    }

    fn notifier_events(&self) -> Option<&dyn NotifierEvents> {
        None
    }

    fn tester(&self) -> Option<&dyn Tester> {
        None
    }
}

/// Success/failure of a monitored service.
pub trait BasicEvents {
    fn on_success(&self, service: &Service);
    fn on_failure(&self, service: &Service, failure: &Failure);
}

pub trait ServiceEvents {
    fn on_new_service(&self, service: &Service);
    fn on_updated_service(&self, service: &Service);
    fn on_deleted_service(&self, service: &Service);
}

pub trait UserEvents {
    fn on_new_user(&self, user: &User);
    fn on_updated_user(&self, user: &User);
    fn on_deleted_user(&self, user: &User);
}

pub trait NotifierEvents {
    fn on_updated_notifier(&self, config: &NotificationConfig);
}

/// Self-test used by the configuration UI. Sends directly, bypassing the
/// queue, so the operator sees the outcome immediately.
#[async_trait]
pub trait Tester: Send + Sync {
    async fn on_test(&self) -> Result<(), SenderError>;
}

/// Message group for events about a service.
pub fn service_group(service: &Service) -> String {
    format!("service_{}", service.id)
}

/// Message group for events about a user.
pub fn user_group(user: &User) -> String {
    format!("user_{}", user.id)
}
