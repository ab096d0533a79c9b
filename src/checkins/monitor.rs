//! Heartbeat measurement for checkins.
//!
//! The monitor only measures: how long a checkin's period and grace are,
//! when it was last hit and how much time is left before the next hit is
//! due. Deciding what to do about an overdue checkin belongs to the
//! alerting layer (see `alerting::checkin_sweep`).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::db::models::{Checkin, CheckinHit, Failure, Service};
use crate::db::{Store, StoreError};

/// Point-in-time heartbeat state of one checkin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckinStatus {
    pub checkin_id: i64,
    pub last_hit: Option<DateTime<Utc>>,
    /// Seconds until the next hit is due; negative once it is late.
    pub expected_in_seconds: i64,
    pub grace_seconds: i64,
    pub overdue: bool,
    pub link: String,
}

pub struct CheckinMonitor {
    store: Arc<dyn Store>,
    base_url: String,
}

impl CheckinMonitor {
    pub fn new(store: Arc<dyn Store>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The checkin interval as a duration. Values that cannot be a
    /// duration (negative, out of range) degrade to zero.
    pub fn period(&self, checkin: &Checkin) -> Duration {
        seconds_or_zero(checkin.interval)
    }

    /// The grace period as a duration, with the same fallback as `period`.
    pub fn grace(&self, checkin: &Checkin) -> Duration {
        seconds_or_zero(checkin.grace_period)
    }

    /// The most recent hit, or the zero-value hit if there never was one.
    pub fn last_hit(&self, checkin: &Checkin) -> Result<CheckinHit, StoreError> {
        Ok(self.store.last_checkin_hit(checkin.id)?.unwrap_or_default())
    }

    /// Time left before the next heartbeat is due, before grace:
    /// `period - (now - last_hit)`. Zero or negative means due or late.
    pub fn expected(&self, checkin: &Checkin, now: DateTime<Utc>) -> Result<Duration, StoreError> {
        let last = self.last_hit(checkin)?;
        Ok(self.period(checkin) - (now - last.created_at))
    }

    /// Late beyond the grace period: `expected + grace < 0`.
    pub fn is_overdue(&self, checkin: &Checkin, now: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(past_grace(self.expected(checkin, now)?, self.grace(checkin)))
    }

    /// The URL a monitored service pings.
    pub fn link(&self, checkin: &Checkin) -> String {
        format!("{}/checkin/{}", self.base_url, checkin.api_key)
    }

    pub fn status(&self, checkin: &Checkin, now: DateTime<Utc>) -> Result<CheckinStatus, StoreError> {
        let last = self.store.last_checkin_hit(checkin.id)?;
        let last_at = last.as_ref().map_or(DateTime::<Utc>::UNIX_EPOCH, |h| h.created_at);
        let expected = self.period(checkin) - (now - last_at);
        let grace = self.grace(checkin);

        Ok(CheckinStatus {
            checkin_id: checkin.id,
            last_hit: last.map(|h| h.created_at),
            expected_in_seconds: expected.num_seconds(),
            grace_seconds: grace.num_seconds(),
            overdue: past_grace(expected, grace),
            link: self.link(checkin),
        })
    }

    pub fn find(&self, id: i64) -> Result<Checkin, StoreError> {
        self.store.find_checkin(id)
    }

    pub fn find_by_key(&self, api_key: &str) -> Result<Checkin, StoreError> {
        self.store.find_checkin_by_key(api_key)
    }

    pub fn all(&self) -> Result<Vec<Checkin>, StoreError> {
        self.store.all_checkins()
    }

    /// The service this checkin reports for.
    pub fn service(&self, checkin: &Checkin) -> Result<Service, StoreError> {
        self.store.find_service(checkin.service_id)
    }

    /// Missed-heartbeat failures recorded against this checkin.
    pub fn failures(&self, checkin: &Checkin) -> Result<Vec<Failure>, StoreError> {
        self.store.failures_for_checkin(checkin.id)
    }

    pub fn hits(&self, checkin: &Checkin) -> Result<Vec<CheckinHit>, StoreError> {
        self.store.checkin_hits(checkin.id)
    }

    /// Records a heartbeat arriving on the checkin identified by `api_key`.
    pub fn record_hit(
        &self,
        api_key: &str,
        from: &str,
        now: DateTime<Utc>,
    ) -> Result<CheckinHit, StoreError> {
        let checkin = self.store.find_checkin_by_key(api_key)?;
        let hit = self.store.create_checkin_hit(CheckinHit {
            id: 0,
            checkin_id: checkin.id,
            from: from.to_string(),
            created_at: now,
        })?;
        debug!(checkin_id = checkin.id, from, "Checkin hit recorded.");
        Ok(hit)
    }
}

// A sum too large to represent is far in the future, so not overdue.
fn past_grace(expected: Duration, grace: Duration) -> bool {
    expected
        .checked_add(&grace)
        .is_some_and(|left| left < Duration::zero())
}

fn seconds_or_zero(seconds: i64) -> Duration {
    if seconds < 0 {
        return Duration::zero();
    }
    Duration::try_seconds(seconds).unwrap_or_else(Duration::zero)
}
