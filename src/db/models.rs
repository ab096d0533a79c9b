use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A heartbeat contract for one service.
/// The monitored service is expected to hit its checkin link every
/// `interval` seconds, with `grace_period` seconds of tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkin {
    pub id: i64,
    pub service_id: i64,
    pub name: String,
    pub api_key: String,
    pub interval: i64,     // seconds
    pub grace_period: i64, // seconds
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One recorded arrival of a heartbeat ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinHit {
    pub id: i64,
    pub checkin_id: i64,
    pub from: String, // remote address of the pinging service
    pub created_at: DateTime<Utc>,
}

impl Default for CheckinHit {
    /// The zero-value hit, returned when a checkin has never been hit.
    fn default() -> Self {
        Self {
            id: 0,
            checkin_id: 0,
            from: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// A monitored service. Only the fields notifiers need for message
/// formatting are carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub service_type: String, // e.g., "http", "tcp", "checkin"
    pub interval: i64,
    pub allow_notifications: bool,
    pub online: bool,
}

/// A recorded failure of a service or one of its checkins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub id: i64,
    pub service_id: i64,
    pub checkin_id: Option<i64>,
    pub method: String, // "checkin" for missed heartbeats
    pub issue: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub admin: bool,
}
