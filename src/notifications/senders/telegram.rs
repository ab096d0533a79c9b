use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{BasicEvents, Notifier, SenderError, ServiceEvents, Tester, service_group};
use crate::db::models::{Failure, Service};
use crate::notifications::models::{NotificationConfig, QueuedMessage};
use crate::notifications::runtime::NotifierRuntime;

const METHOD: &str = "telegram";
const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// A sender for pushing notifications via the Telegram Bot API.
///
/// Field mapping: `api_secret` is the bot token, `var1` the target chat id,
/// `host` an optional API base URL override.
pub struct TelegramNotifier {
    client: Client,
    runtime: NotifierRuntime,
}

impl Default for TelegramNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TelegramNotifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            runtime: NotifierRuntime::new(METHOD, "Telegram"),
        }
    }

    /// Escapes text for Telegram MarkdownV2.
    /// Characters to escape: _ * [ ] ( ) ~ ` > # + - = | { } . !
    fn escape_markdown_v2(text: &str) -> String {
        let mut escaped_text = String::with_capacity(text.len());
        for char_to_escape in text.chars() {
            if matches!(
                char_to_escape,
                '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
                    | '|' | '{' | '}' | '.' | '!'
            ) {
                escaped_text.push('\\');
            }
            escaped_text.push(char_to_escape);
        }
        escaped_text
    }
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn method(&self) -> &str {
        METHOD
    }

    fn title(&self) -> &str {
        "Telegram"
    }

    fn runtime(&self) -> &NotifierRuntime {
        &self.runtime
    }

    async fn send(&self, message: &QueuedMessage) -> Result<(), SenderError> {
        let config = self.select();
        let base = if config.host.trim().is_empty() {
            DEFAULT_API_URL
        } else {
            config.host.trim_end_matches('/')
        };
        let api_url = format!("{base}/bot{}/sendMessage", config.api_secret);

        let escaped_message = Self::escape_markdown_v2(&message.body);
        let payload = TelegramMessage {
            chat_id: &config.var1,
            text: &escaped_message,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&api_url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }

    fn on_save(&self, config: &NotificationConfig) -> Result<(), SenderError> {
        if config.api_secret.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Telegram bot token (api_secret) is required".to_string(),
            ));
        }
        if config.var1.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Telegram chat id (var1) is required".to_string(),
            ));
        }
        Ok(())
    }

    fn basic_events(&self) -> Option<&dyn BasicEvents> {
        Some(self)
    }

    fn service_events(&self) -> Option<&dyn ServiceEvents> {
        Some(self)
    }

    fn tester(&self) -> Option<&dyn Tester> {
        Some(self)
    }
}

impl BasicEvents for TelegramNotifier {
    fn on_success(&self, service: &Service) {
        self.add_queue(
            &service_group(service),
            format!("✅ {} is back online.", service.name),
        );
    }

    fn on_failure(&self, service: &Service, failure: &Failure) {
        self.add_queue(
            &service_group(service),
            format!("🔴 {} is down: {}", service.name, failure.issue),
        );
    }
}

impl ServiceEvents for TelegramNotifier {
    fn on_new_service(&self, service: &Service) {
        self.add_queue(&service_group(service), format!("Now monitoring {}.", service.name));
    }

    fn on_updated_service(&self, service: &Service) {
        self.add_queue(&service_group(service), format!("{} was updated.", service.name));
    }

    fn on_deleted_service(&self, service: &Service) {
        self.add_queue(&service_group(service), format!("{} is no longer monitored.", service.name));
    }
}

#[async_trait]
impl Tester for TelegramNotifier {
    async fn on_test(&self) -> Result<(), SenderError> {
        let message = QueuedMessage::new("test", "Test message from statuswatch.");
        self.send(&message).await
    }
}
