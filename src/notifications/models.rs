use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted settings for one notifier method.
///
/// The free-form fields (`host`, `port`, credentials, `var1`/`var2`) mean
/// whatever the backend needs them to mean; see each sender for its mapping.
/// This is the configuration schema external tooling round-trips, so every
/// field is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub id: i64,
    pub method: String, // unique, e.g. "webhook", "telegram"
    pub title: String,
    pub enabled: bool,
    /// Max sends per limit window. Zero or negative disables limiting.
    pub limits: i64,
    pub host: String,
    pub port: i64,
    pub username: String,
    pub password: String,
    pub api_key: String,
    pub api_secret: String,
    pub var1: String,
    pub var2: String,
    pub last_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationConfig {
    /// A disabled, unlimited config row for `method`, as created on first run.
    pub fn new(method: &str, title: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            method: method.to_string(),
            title: title.to_string(),
            enabled: false,
            limits: 0,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            var1: String::new(),
            var2: String::new(),
            last_sent: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Looks up a field by name, ignoring case and underscores, so generic
    /// UI code can read `"Host"`, `"api_key"` or `"ApiKey"` alike.
    /// Unknown names yield an empty string.
    pub fn get_value(&self, field: &str) -> String {
        let key: String = field
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "method" => self.method.clone(),
            "title" => self.title.clone(),
            "enabled" => self.enabled.to_string(),
            "limits" => self.limits.to_string(),
            "host" => self.host.clone(),
            "port" => self.port.to_string(),
            "username" => self.username.clone(),
            "password" => self.password.clone(),
            "apikey" => self.api_key.clone(),
            "apisecret" => self.api_secret.clone(),
            "var1" => self.var1.clone(),
            "var2" => self.var2.clone(),
            _ => String::new(),
        }
    }

    /// Time elapsed since the last send, or zero if nothing was ever sent.
    pub fn last_sent_elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        match self.last_sent {
            Some(sent) => now - sent,
            None => chrono::Duration::zero(),
        }
    }
}

/// An outbound message waiting in a notifier's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Grouping key, e.g. `service_3` or `user_7`.
    pub group: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl QueuedMessage {
    pub fn new(group: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}
