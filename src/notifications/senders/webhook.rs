use async_trait::async_trait;
use reqwest::{Client, Method, header};
use tera::{Context, Tera};

use super::{
    BasicEvents, Notifier, NotifierEvents, SenderError, ServiceEvents, Tester, UserEvents,
    service_group, user_group,
};
use crate::db::models::{Failure, Service, User};
use crate::notifications::models::{NotificationConfig, QueuedMessage};
use crate::notifications::runtime::NotifierRuntime;

const METHOD: &str = "webhook";
const DEFAULT_BODY_TEMPLATE: &str = r#"{"title": "{{ title }}", "group": "{{ group }}", "message": "{{ message }}"}"#;

/// Pushes notifications to a custom HTTP endpoint.
///
/// Field mapping: `host` is the endpoint URL, `var1` the HTTP method
/// (`POST` when empty), `var2` an optional Tera body template for POST with
/// `title`, `group` and `message` in scope.
pub struct WebhookNotifier {
    client: Client,
    runtime: NotifierRuntime,
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            runtime: NotifierRuntime::new(METHOD, "Webhook"),
        }
    }

    fn http_method(config: &NotificationConfig) -> Result<Method, SenderError> {
        match config.var1.trim().to_uppercase().as_str() {
            "" | "POST" => Ok(Method::POST),
            "GET" => Ok(Method::GET),
            other => Err(SenderError::InvalidConfiguration(format!(
                "Unsupported HTTP method: {other}"
            ))),
        }
    }

    fn render_body(
        config: &NotificationConfig,
        message: &QueuedMessage,
    ) -> Result<String, SenderError> {
        let template = if config.var2.trim().is_empty() {
            DEFAULT_BODY_TEMPLATE
        } else {
            config.var2.as_str()
        };

        let mut context = Context::new();
        context.insert("title", &config.title);
        context.insert("group", &message.group);
        context.insert("message", &message.body);

        Tera::one_off(template, &context, true).map_err(|e| SenderError::TemplatingError(e.to_string()))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn method(&self) -> &str {
        METHOD
    }

    fn title(&self) -> &str {
        "Webhook"
    }

    fn runtime(&self) -> &NotifierRuntime {
        &self.runtime
    }

    async fn send(&self, message: &QueuedMessage) -> Result<(), SenderError> {
        let config = self.select();
        let http_method = Self::http_method(&config)?;

        let mut request_builder = self.client.request(http_method.clone(), &config.host);
        if !config.api_key.is_empty() {
            request_builder = request_builder.bearer_auth(&config.api_key);
        }

        if http_method == Method::POST {
            let rendered_body = Self::render_body(&config, message)?;
            request_builder = request_builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(rendered_body);
        }

        let response = request_builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }

    fn on_save(&self, config: &NotificationConfig) -> Result<(), SenderError> {
        if config.host.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Webhook URL (host) is required".to_string(),
            ));
        }
        reqwest::Url::parse(&config.host)
            .map_err(|e| SenderError::InvalidConfiguration(format!("Invalid webhook URL: {e}")))?;
        Self::http_method(config)?;
        Ok(())
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

impl BasicEvents for WebhookNotifier {
    fn on_success(&self, service: &Service) {
        self.add_queue(
            &service_group(service),
            format!("Service '{}' is back online.", service.name),
        );
    }

    fn on_failure(&self, service: &Service, failure: &Failure) {
        self.add_queue(
            &service_group(service),
            format!("Service '{}' is failing: {}", service.name, failure.issue),
        );
    }
}

impl ServiceEvents for WebhookNotifier {
    fn on_new_service(&self, service: &Service) {
        self.add_queue(
            &service_group(service),
            format!("New service '{}' is being monitored.", service.name),
        );
    }

    fn on_updated_service(&self, service: &Service) {
        self.add_queue(
            &service_group(service),
            format!("Service '{}' was updated.", service.name),
        );
    }

    fn on_deleted_service(&self, service: &Service) {
        self.add_queue(
            &service_group(service),
            format!("Service '{}' was deleted.", service.name),
        );
    }
}

impl UserEvents for WebhookNotifier {
    fn on_new_user(&self, user: &User) {
        self.add_queue(&user_group(user), format!("New user '{}' was created.", user.username));
    }

    fn on_updated_user(&self, user: &User) {
        self.add_queue(&user_group(user), format!("User '{}' was updated.", user.username));
    }

    fn on_deleted_user(&self, user: &User) {
        self.add_queue(&user_group(user), format!("User '{}' was deleted.", user.username));
    }
}

impl NotifierEvents for WebhookNotifier {
    fn on_updated_notifier(&self, config: &NotificationConfig) {
        self.add_queue(
            &format!("notifier_{}", config.method),
            format!("Notifier '{}' was updated.", config.title),
        );
    }
}

#[async_trait]
impl Tester for WebhookNotifier {
    async fn on_test(&self) -> Result<(), SenderError> {
        let message = QueuedMessage::new(
            "test",
            format!("This is a test message from notifier '{}'.", self.select().title),
        );
        self.send(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_body() {
        let config = NotificationConfig::new(METHOD, "Webhook");
        let message = QueuedMessage::new("service_3", "down");
        let body = WebhookNotifier::render_body(&config, &message).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["group"], "service_3");
        assert_eq!(json["message"], "down");
    }

    #[test]
    fn test_render_custom_body() {
        let mut config = NotificationConfig::new(METHOD, "Webhook");
        config.var2 = "{{ group }}: {{ message }}".to_string();
        let message = QueuedMessage::new("user_1", "hello");
        assert_eq!(WebhookNotifier::render_body(&config, &message).unwrap(), "user_1: hello");
    }

    #[test]
    fn test_on_save_validates_candidate_config() {
        let notifier = WebhookNotifier::new();
        let mut candidate = NotificationConfig::new(METHOD, "Webhook");
        assert!(matches!(
            notifier.on_save(&candidate),
            Err(SenderError::InvalidConfiguration(_))
        ));

        candidate.host = "https://hooks.example.com/notify".to_string();
        candidate.var1 = "PUT".to_string();
        assert!(matches!(
            notifier.on_save(&candidate),
            Err(SenderError::InvalidConfiguration(_))
        ));

        candidate.var1 = "get".to_string();
        assert!(notifier.on_save(&candidate).is_ok());
        // The live config is never consulted.
        assert_eq!(notifier.select().host, "");
    }

    #[test]
    fn test_hooks_enqueue_one_message_each() {
        let notifier = WebhookNotifier::new();
        let service = Service {
            id: 3,
            name: "api".to_string(),
            domain: "https://api.example.com".to_string(),
            service_type: "http".to_string(),
            interval: 30,
            allow_notifications: true,
            online: false,
        };
        notifier.on_new_service(&service);
        notifier.on_failure(
            &service,
            &Failure {
                id: 1,
                service_id: 3,
                checkin_id: None,
                method: "http".to_string(),
                issue: "timeout".to_string(),
                created_at: chrono::Utc::now(),
            },
        );
        notifier.on_updated_notifier(&notifier.select());

        let queued = notifier.runtime().queued();
        assert_eq!(queued.len(), 3);
        assert_eq!(queued[1].group, "service_3");
        assert_eq!(queued[1].body, "Service 'api' is failing: timeout");
        assert_eq!(queued[2].group, "notifier_webhook");
    }
}
