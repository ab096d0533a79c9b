//! In-process `Store` backed by concurrent maps.
//!
//! Used by the server binary when no external database is wired in, and by
//! the test suites. Every table is a `DashMap` keyed by primary key, with an
//! atomic sequence handing out ids.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use super::models::{Checkin, CheckinHit, Failure, Service, User};
use super::store::{Store, StoreError};
use crate::notifications::models::NotificationConfig;

#[derive(Debug, Default)]
struct Sequence(AtomicI64);

impl Sequence {
    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    checkins: DashMap<i64, Checkin>,
    checkin_hits: DashMap<i64, CheckinHit>,
    services: DashMap<i64, Service>,
    failures: DashMap<i64, Failure>,
    users: DashMap<i64, User>,
    // Key: notifier method.
    notifications: DashMap<String, NotificationConfig>,

    checkin_seq: Sequence,
    hit_seq: Sequence,
    service_seq: Sequence,
    failure_seq: Sequence,
    user_seq: Sequence,
    notification_seq: Sequence,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn find_checkin(&self, id: i64) -> Result<Checkin, StoreError> {
        self.checkins
            .get(&id)
            .map(|c| c.value().clone())
            .ok_or_else(|| StoreError::not_found("checkin", id))
    }

    fn find_checkin_by_key(&self, api_key: &str) -> Result<Checkin, StoreError> {
        self.checkins
            .iter()
            .find(|c| c.api_key == api_key)
            .map(|c| c.value().clone())
            .ok_or_else(|| StoreError::not_found("checkin", api_key))
    }

    fn all_checkins(&self) -> Result<Vec<Checkin>, StoreError> {
        let mut all: Vec<Checkin> = self.checkins.iter().map(|c| c.value().clone()).collect();
        all.sort_by_key(|c| c.id);
        Ok(all)
    }

    fn create_checkin(&self, mut checkin: Checkin) -> Result<Checkin, StoreError> {
        if self.checkins.iter().any(|c| c.api_key == checkin.api_key) {
            return Err(StoreError::Conflict {
                kind: "checkin",
                key: checkin.api_key,
            });
        }
        checkin.id = self.checkin_seq.next();
        self.checkins.insert(checkin.id, checkin.clone());
        Ok(checkin)
    }

    fn update_checkin(&self, mut checkin: Checkin) -> Result<Checkin, StoreError> {
        let mut entry = self
            .checkins
            .get_mut(&checkin.id)
            .ok_or_else(|| StoreError::not_found("checkin", checkin.id))?;
        checkin.updated_at = Utc::now();
        *entry = checkin.clone();
        Ok(checkin)
    }

    fn delete_checkin(&self, id: i64) -> Result<(), StoreError> {
        self.checkins
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("checkin", id))?;
        self.checkin_hits.retain(|_, hit| hit.checkin_id != id);
        Ok(())
    }

    fn last_checkin_hit(&self, checkin_id: i64) -> Result<Option<CheckinHit>, StoreError> {
        Ok(self
            .checkin_hits
            .iter()
            .filter(|h| h.checkin_id == checkin_id)
            .max_by_key(|h| (h.created_at, h.id))
            .map(|h| h.value().clone()))
    }

    fn checkin_hits(&self, checkin_id: i64) -> Result<Vec<CheckinHit>, StoreError> {
        let mut hits: Vec<CheckinHit> = self
            .checkin_hits
            .iter()
            .filter(|h| h.checkin_id == checkin_id)
            .map(|h| h.value().clone())
            .collect();
        hits.sort_by_key(|h| (h.created_at, h.id));
        Ok(hits)
    }

    fn create_checkin_hit(&self, mut hit: CheckinHit) -> Result<CheckinHit, StoreError> {
        if !self.checkins.contains_key(&hit.checkin_id) {
            return Err(StoreError::not_found("checkin", hit.checkin_id));
        }
        hit.id = self.hit_seq.next();
        self.checkin_hits.insert(hit.id, hit.clone());
        Ok(hit)
    }

    fn find_service(&self, id: i64) -> Result<Service, StoreError> {
        self.services
            .get(&id)
            .map(|s| s.value().clone())
            .ok_or_else(|| StoreError::not_found("service", id))
    }

    fn create_service(&self, mut service: Service) -> Result<Service, StoreError> {
        service.id = self.service_seq.next();
        self.services.insert(service.id, service.clone());
        Ok(service)
    }

    fn create_failure(&self, mut failure: Failure) -> Result<Failure, StoreError> {
        failure.id = self.failure_seq.next();
        self.failures.insert(failure.id, failure.clone());
        Ok(failure)
    }

    fn failures_for_checkin(&self, checkin_id: i64) -> Result<Vec<Failure>, StoreError> {
        let mut failures: Vec<Failure> = self
            .failures
            .iter()
            .filter(|f| f.method == "checkin" && f.checkin_id == Some(checkin_id))
            .map(|f| f.value().clone())
            .collect();
        failures.sort_by_key(|f| f.id);
        Ok(failures)
    }

    fn find_user(&self, id: i64) -> Result<User, StoreError> {
        self.users
            .get(&id)
            .map(|u| u.value().clone())
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    fn create_user(&self, mut user: User) -> Result<User, StoreError> {
        user.id = self.user_seq.next();
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_notification(&self, method: &str) -> Result<NotificationConfig, StoreError> {
        self.notifications
            .get(method)
            .map(|n| n.value().clone())
            .ok_or_else(|| StoreError::not_found("notification", method))
    }

    fn all_notifications(&self) -> Result<Vec<NotificationConfig>, StoreError> {
        let mut all: Vec<NotificationConfig> =
            self.notifications.iter().map(|n| n.value().clone()).collect();
        all.sort_by_key(|n| n.id);
        Ok(all)
    }

    fn create_notification(
        &self,
        mut config: NotificationConfig,
    ) -> Result<NotificationConfig, StoreError> {
        if self.notifications.contains_key(&config.method) {
            return Err(StoreError::Conflict {
                kind: "notification",
                key: config.method,
            });
        }
        config.id = self.notification_seq.next();
        let now = Utc::now();
        config.created_at = now;
        config.updated_at = now;
        self.notifications.insert(config.method.clone(), config.clone());
        Ok(config)
    }

    fn update_notification(
        &self,
        mut config: NotificationConfig,
    ) -> Result<NotificationConfig, StoreError> {
        let mut entry = self
            .notifications
            .get_mut(&config.method)
            .ok_or_else(|| StoreError::not_found("notification", &config.method))?;
        config.id = entry.id;
        config.created_at = entry.created_at;
        config.updated_at = Utc::now();
        *entry = config.clone();
        Ok(config)
    }
}
