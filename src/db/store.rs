use thiserror::Error;

use super::models::{Checkin, CheckinHit, Failure, Service, User};
use crate::notifications::models::NotificationConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
    #[error("{kind} already exists: {key}")]
    Conflict { kind: &'static str, key: String },
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Record storage consumed by the checkin monitor and the notifier registry.
///
/// Calls are synchronous and fallible. Implementations own retry policy;
/// callers surface errors as-is. `create_*` methods assign the id (and the
/// creation timestamp where the record has one left unset by the caller)
/// and return the stored record.
pub trait Store: Send + Sync {
    fn find_checkin(&self, id: i64) -> Result<Checkin, StoreError>;
    fn find_checkin_by_key(&self, api_key: &str) -> Result<Checkin, StoreError>;
    fn all_checkins(&self) -> Result<Vec<Checkin>, StoreError>;
    fn create_checkin(&self, checkin: Checkin) -> Result<Checkin, StoreError>;
    fn update_checkin(&self, checkin: Checkin) -> Result<Checkin, StoreError>;
    /// Removes a checkin together with its hits.
    fn delete_checkin(&self, id: i64) -> Result<(), StoreError>;

    /// The most recently arrived hit for a checkin, if any.
    fn last_checkin_hit(&self, checkin_id: i64) -> Result<Option<CheckinHit>, StoreError>;
    /// All hits for a checkin, oldest first.
    fn checkin_hits(&self, checkin_id: i64) -> Result<Vec<CheckinHit>, StoreError>;
    fn create_checkin_hit(&self, hit: CheckinHit) -> Result<CheckinHit, StoreError>;

    fn find_service(&self, id: i64) -> Result<Service, StoreError>;
    fn create_service(&self, service: Service) -> Result<Service, StoreError>;

    fn create_failure(&self, failure: Failure) -> Result<Failure, StoreError>;
    fn failures_for_checkin(&self, checkin_id: i64) -> Result<Vec<Failure>, StoreError>;

    fn find_user(&self, id: i64) -> Result<User, StoreError>;
    fn create_user(&self, user: User) -> Result<User, StoreError>;

    fn find_notification(&self, method: &str) -> Result<NotificationConfig, StoreError>;
    fn all_notifications(&self) -> Result<Vec<NotificationConfig>, StoreError>;
    fn create_notification(&self, config: NotificationConfig) -> Result<NotificationConfig, StoreError>;
    fn update_notification(&self, config: NotificationConfig) -> Result<NotificationConfig, StoreError>;
}
