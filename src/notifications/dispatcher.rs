use std::sync::Arc;

use tracing::debug;

use super::models::NotificationConfig;
use super::registry::{NotifierRegistry, is_enabled};
use super::senders::Notifier;
use crate::db::models::{Failure, Service, User};

/// Fans domain events out to every enabled notifier that implements the
/// matching capability. Hooks only enqueue, so dispatch never waits on I/O.
///
/// Each entry point returns how many notifiers were invoked.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<NotifierRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<NotifierRegistry>) -> Self {
        Self { registry }
    }

    fn each_enabled(&self, event: &str, mut hook: impl FnMut(&dyn Notifier) -> bool) -> usize {
        let mut invoked = 0;
        for notifier in self.registry.notifiers() {
            if is_enabled(notifier.as_ref()) && hook(notifier.as_ref()) {
                invoked += 1;
            }
        }
        debug!(event, invoked, "Dispatched notifier event.");
        invoked
    }

    pub fn on_success(&self, service: &Service) -> usize {
        if !service.allow_notifications {
            return 0;
        }
        self.each_enabled("success", |n| match n.basic_events() {
            Some(events) => {
                events.on_success(service);
                true
            }
            None => false,
        })
    }

    pub fn on_failure(&self, service: &Service, failure: &Failure) -> usize {
        if !service.allow_notifications {
            return 0;
        }
        self.each_enabled("failure", |n| match n.basic_events() {
            Some(events) => {
                events.on_failure(service, failure);
                true
            }
            None => false,
        })
    }

    pub fn on_new_service(&self, service: &Service) -> usize {
        self.each_enabled("new_service", |n| match n.service_events() {
            Some(events) => {
                events.on_new_service(service);
                true
            }
            None => false,
        })
    }

    pub fn on_updated_service(&self, service: &Service) -> usize {
        self.each_enabled("updated_service", |n| match n.service_events() {
            Some(events) => {
                events.on_updated_service(service);
                true
            }
            None => false,
        })
    }

    pub fn on_deleted_service(&self, service: &Service) -> usize {
        self.each_enabled("deleted_service", |n| match n.service_events() {
            Some(events) => {
                events.on_deleted_service(service);
                true
            }
            None => false,
        })
    }

    pub fn on_new_user(&self, user: &User) -> usize {
        self.each_enabled("new_user", |n| match n.user_events() {
            Some(events) => {
                events.on_new_user(user);
                true
            }
            None => false,
        })
    }

    pub fn on_updated_user(&self, user: &User) -> usize {
        self.each_enabled("updated_user", |n| match n.user_events() {
            Some(events) => {
                events.on_updated_user(user);
                true
            }
            None => false,
        })
    }

    pub fn on_deleted_user(&self, user: &User) -> usize {
        self.each_enabled("deleted_user", |n| match n.user_events() {
            Some(events) => {
                events.on_deleted_user(user);
                true
            }
            None => false,
        })
    }

    pub fn on_updated_notifier(&self, config: &NotificationConfig) -> usize {
        self.each_enabled("updated_notifier", |n| match n.notifier_events() {
            Some(events) => {
                events.on_updated_notifier(config);
                true
            }
            None => false,
        })
    }
}
