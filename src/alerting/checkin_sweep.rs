use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::checkins::CheckinMonitor;
use crate::db::models::{Checkin, Failure};
use crate::db::{Store, StoreError};
use crate::notifications::EventDispatcher;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Storage error: {0}")]
    StoreError(#[from] StoreError),
}

/// What one sweep pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub went_overdue: usize,
    pub recovered: usize,
}

/// Periodically asks the checkin monitor which heartbeats are overdue and
/// turns state changes into dispatcher events: healthy→overdue records a
/// checkin failure and fires `on_failure`, overdue→healthy fires
/// `on_success`. Steady states fire nothing.
pub struct CheckinSweeper {
    store: Arc<dyn Store>,
    monitor: Arc<CheckinMonitor>,
    dispatcher: EventDispatcher,
    // Key: checkin id, Value: overdue at the last sweep.
    overdue: DashMap<i64, bool>,
}

impl CheckinSweeper {
    pub fn new(store: Arc<dyn Store>, monitor: Arc<CheckinMonitor>, dispatcher: EventDispatcher) -> Self {
        Self {
            store,
            monitor,
            dispatcher,
            overdue: DashMap::new(),
        }
    }

    pub async fn run_periodic(self: Arc<Self>, period: Duration, mut stop_rx: watch::Receiver<bool>) {
        info!(period_seconds = period.as_secs(), "Checkin sweep started.");
        let mut ticker = interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop_rx.changed() => break,
            }
            match self.sweep(Utc::now()) {
                Ok(report) => debug!(
                    checked = report.checked,
                    went_overdue = report.went_overdue,
                    recovered = report.recovered,
                    tracked = self.tracked(),
                    "Checkin sweep finished."
                ),
                Err(e) => error!(error = %e, "Checkin sweep failed."),
            }
        }
        info!("Checkin sweep stopped.");
    }

    /// One pass over every checkin. A checkin whose transition could not
    /// be handled keeps its previous state, so the next pass retries it.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        let mut report = SweepReport::default();
        let checkins = self.monitor.all()?;
        let live: HashSet<i64> = checkins.iter().map(|c| c.id).collect();
        self.overdue.retain(|id, _| live.contains(id));

        for checkin in checkins {
            report.checked += 1;
            let overdue = match self.monitor.is_overdue(&checkin, now) {
                Ok(overdue) => overdue,
                Err(e) => {
                    warn!(checkin_id = checkin.id, error = %e, "Could not evaluate checkin.");
                    continue;
                }
            };

            // A checkin seen for the first time counts as healthy.
            let was_overdue = self.overdue.get(&checkin.id).is_some_and(|state| *state);
            let handled = match (was_overdue, overdue) {
                (false, true) => self
                    .handle_overdue(&checkin, now)
                    .map(|()| report.went_overdue += 1),
                (true, false) => self
                    .handle_recovered(&checkin)
                    .map(|()| report.recovered += 1),
                _ => Ok(()),
            };
            match handled {
                Ok(()) => {
                    self.overdue.insert(checkin.id, overdue);
                }
                Err(e) => {
                    error!(checkin_id = checkin.id, error = %e, "Failed to handle checkin state change.");
                }
            }
        }
        Ok(report)
    }

    /// Number of checkins whose state is being tracked.
    pub fn tracked(&self) -> usize {
        self.overdue.len()
    }

    fn handle_overdue(&self, checkin: &Checkin, now: DateTime<Utc>) -> Result<(), SweepError> {
        let service = self.monitor.service(checkin)?;
        let last = self.monitor.last_hit(checkin)?;
        let issue = if last.id == 0 {
            format!("Checkin '{}' has never been received", checkin.name)
        } else {
            format!(
                "Checkin '{}' expected every {}s, last received {}",
                checkin.name,
                checkin.interval,
                last.created_at.to_rfc3339()
            )
        };

        let failure = self.store.create_failure(Failure {
            id: 0,
            service_id: service.id,
            checkin_id: Some(checkin.id),
            method: "checkin".to_string(),
            issue,
            created_at: now,
        })?;
        let notified = self.dispatcher.on_failure(&service, &failure);
        warn!(checkin_id = checkin.id, service = %service.name, notified, "Checkin is overdue.");
        Ok(())
    }

    fn handle_recovered(&self, checkin: &Checkin) -> Result<(), SweepError> {
        let service = self.monitor.service(checkin)?;
        let notified = self.dispatcher.on_success(&service);
        info!(checkin_id = checkin.id, service = %service.name, notified, "Checkin recovered.");
        Ok(())
    }
}
