#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use statuswatch::db::models::{Failure, Service, User};
use statuswatch::notifications::models::{NotificationConfig, QueuedMessage};
use statuswatch::notifications::runtime::NotifierRuntime;
use statuswatch::notifications::senders::{
    BasicEvents, Notifier, NotifierEvents, SenderError, ServiceEvents, Tester, UserEvents,
};

pub const METHOD: &str = "example";

/// A backend implementing every capability that records sends in memory.
pub struct ExampleNotifier {
    runtime: NotifierRuntime,
    pub sent: Mutex<Vec<QueuedMessage>>,
}

impl ExampleNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runtime: NotifierRuntime::new(METHOD, "Example"),
            sent: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Notifier for ExampleNotifier {
    fn method(&self) -> &str {
        METHOD
    }

    fn title(&self) -> &str {
        "Example"
    }

    fn runtime(&self) -> &NotifierRuntime {
        &self.runtime
    }

    async fn send(&self, message: &QueuedMessage) -> Result<(), SenderError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }

    fn on_save(&self, _config: &NotificationConfig) -> Result<(), SenderError> {
        Err(SenderError::InvalidConfiguration("onsave triggered".to_string()))
    }

    fn basic_events(&self) -> Option<&dyn BasicEvents> {
        Some(self)
    }

    fn service_events(&self) -> Option<&dyn ServiceEvents> {
        Some(self)
    }

    fn user_events(&self) -> Option<&dyn UserEvents> {
        Some(self)
    }

    fn notifier_events(&self) -> Option<&dyn NotifierEvents> {
        Some(self)
    }

    fn tester(&self) -> Option<&dyn Tester> {
        Some(self)
    }
}

impl BasicEvents for ExampleNotifier {
    fn on_success(&self, service: &Service) {
        self.add_queue(&format!("service_{}", service.id), format!("{} is online", service.name));
    }

    fn on_failure(&self, service: &Service, failure: &Failure) {
        self.add_queue(
            &format!("service_{}", service.id),
            format!("{} failed: {}", service.name, failure.issue),
        );
    }
}

impl ServiceEvents for ExampleNotifier {
    fn on_new_service(&self, service: &Service) {
        self.add_queue(&format!("service_{}", service.id), format!("new {}", service.name));
    }

    fn on_updated_service(&self, service: &Service) {
        self.add_queue(&format!("service_{}", service.id), format!("updated {}", service.name));
    }

    fn on_deleted_service(&self, service: &Service) {
        self.add_queue(&format!("service_{}", service.id), format!("deleted {}", service.name));
    }
}

impl UserEvents for ExampleNotifier {
    fn on_new_user(&self, user: &User) {
        self.add_queue(&format!("user_{}", user.id), format!("new {}", user.username));
    }

    fn on_updated_user(&self, user: &User) {
        self.add_queue(&format!("user_{}", user.id), format!("updated {}", user.username));
    }

    fn on_deleted_user(&self, user: &User) {
        self.add_queue(&format!("user_{}", user.id), format!("deleted {}", user.username));
    }
}

impl NotifierEvents for ExampleNotifier {
    fn on_updated_notifier(&self, config: &NotificationConfig) {
        let group = format!("notifier_{}", config.method);
        self.add_queue(&group, format!("notifier {} updated", config.method));
        self.add_queue(&group, format!("notifier {} enabled: {}", config.method, config.enabled));
    }
}

#[async_trait]
impl Tester for ExampleNotifier {
    async fn on_test(&self) -> Result<(), SenderError> {
        self.send(&QueuedMessage::new("test", "test message")).await
    }
}

/// A backend with no event capabilities at all.
pub struct SilentNotifier {
    runtime: NotifierRuntime,
}

impl SilentNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runtime: NotifierRuntime::new("silent", "Silent"),
        })
    }
}

#[async_trait]
impl Notifier for SilentNotifier {
    fn method(&self) -> &str {
        "silent"
    }

    fn title(&self) -> &str {
        "Silent"
    }

    fn runtime(&self) -> &NotifierRuntime {
        &self.runtime
    }

    async fn send(&self, _message: &QueuedMessage) -> Result<(), SenderError> {
        Ok(())
    }
}

pub fn service() -> Service {
    Service {
        id: 1,
        name: "Interpol - All The Rage Back Home".to_string(),
        domain: "https://www.youtube.com/watch?v=-u6DvRyyKGU".to_string(),
        service_type: "http".to_string(),
        interval: 30,
        allow_notifications: true,
        online: true,
    }
}

pub fn failure() -> Failure {
    Failure {
        id: 1,
        service_id: 1,
        checkin_id: None,
        method: "http".to_string(),
        issue: "testing".to_string(),
        created_at: Utc::now(),
    }
}

pub fn user() -> User {
    User {
        id: 1,
        username: "admin".to_string(),
        email: "info@email.com".to_string(),
        admin: true,
    }
}
