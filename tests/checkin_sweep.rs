mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::sync::watch;

use statuswatch::alerting::checkin_sweep::{CheckinSweeper, SweepReport};
use statuswatch::checkins::CheckinMonitor;
use statuswatch::db::models::{Checkin, Service};
use statuswatch::db::{MemoryStore, Store};
use statuswatch::notifications::senders::Notifier;
use statuswatch::notifications::{EventDispatcher, NotifierRegistry, QueueSettings};

use common::ExampleNotifier;

struct Fixture {
    store: Arc<MemoryStore>,
    monitor: Arc<CheckinMonitor>,
    sweeper: Arc<CheckinSweeper>,
    example: Arc<ExampleNotifier>,
    checkin: Checkin,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let service = store
        .create_service(Service {
            id: 0,
            name: "nightly-backup".to_string(),
            domain: String::new(),
            service_type: "checkin".to_string(),
            interval: 60,
            allow_notifications: true,
            online: true,
        })
        .unwrap();
    let now = Utc::now();
    let checkin = store
        .create_checkin(Checkin {
            id: 0,
            service_id: service.id,
            name: "backup cron".to_string(),
            api_key: "backup-key".to_string(),
            interval: 60,
            grace_period: 30,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let registry = Arc::new(NotifierRegistry::new(store.clone(), QueueSettings::default()));
    let example = ExampleNotifier::new();
    registry.register(example.clone()).unwrap();
    // Enabled for dispatch without a running worker, so the queue stays put.
    example.runtime().set_config({
        let mut config = example.select();
        config.enabled = true;
        config
    });

    let monitor = Arc::new(CheckinMonitor::new(store.clone(), "http://status.local"));
    let sweeper = Arc::new(CheckinSweeper::new(
        store.clone(),
        monitor.clone(),
        EventDispatcher::new(registry),
    ));

    Fixture {
        store,
        monitor,
        sweeper,
        example,
        checkin,
    }
}

#[test]
fn test_never_hit_checkin_fails_once() {
    let f = fixture();
    let now = Utc::now();

    let report = f.sweeper.sweep(now).unwrap();
    assert_eq!(
        report,
        SweepReport {
            checked: 1,
            went_overdue: 1,
            recovered: 0
        }
    );
    assert_eq!(f.example.runtime().queue_len(), 1);

    let failures = f.monitor.failures(&f.checkin).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].method, "checkin");
    assert!(failures[0].issue.contains("never been received"));

    // Still overdue: no new failure, no new message.
    let report = f.sweeper.sweep(now + Duration::seconds(10)).unwrap();
    assert_eq!(report.went_overdue, 0);
    assert_eq!(f.example.runtime().queue_len(), 1);
    assert_eq!(f.store.failures_for_checkin(f.checkin.id).unwrap().len(), 1);
}

#[test]
fn test_recovery_after_hit() {
    let f = fixture();
    let now = Utc::now();
    f.sweeper.sweep(now).unwrap();

    f.monitor.record_hit("backup-key", "10.1.2.3", now).unwrap();
    let report = f.sweeper.sweep(now + Duration::seconds(5)).unwrap();
    assert_eq!(report.recovered, 1);

    let queued = f.example.runtime().queued();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[1].body, "nightly-backup is online");
}

#[test]
fn test_grace_window_delays_failure() {
    let f = fixture();
    let hit_at = Utc::now();
    f.monitor.record_hit("backup-key", "10.1.2.3", hit_at).unwrap();

    // 80s after the hit: 20s late, inside the 30s grace.
    let report = f.sweeper.sweep(hit_at + Duration::seconds(80)).unwrap();
    assert_eq!(report.went_overdue, 0);

    let report = f.sweeper.sweep(hit_at + Duration::seconds(95)).unwrap();
    assert_eq!(report.went_overdue, 1);
    assert_eq!(f.example.runtime().queue_len(), 1);
}

#[tokio::test]
async fn test_periodic_sweep_stops_on_signal() {
    let f = fixture();
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(
        f.sweeper
            .clone()
            .run_periodic(StdDuration::from_millis(20), stop_rx),
    );

    tokio::time::sleep(StdDuration::from_millis(100)).await;
    stop_tx.send(true).unwrap();
    handle.await.unwrap();

    // Only the first transition is reported, however many passes ran.
    assert_eq!(f.example.runtime().queue_len(), 1);
}

#[test]
fn test_failed_transition_is_retried_on_next_pass() {
    let f = fixture();
    let now = Utc::now();
    // Points at a service that does not exist yet.
    let orphan = f
        .store
        .create_checkin(Checkin {
            id: 0,
            service_id: 2,
            name: "orphan cron".to_string(),
            api_key: "orphan-key".to_string(),
            interval: 60,
            grace_period: 0,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    // The pass keeps going: the healthy fixture checkin is still handled.
    let report = f.sweeper.sweep(now).unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.went_overdue, 1);
    assert!(f.monitor.failures(&orphan).unwrap().is_empty());

    let service = f
        .store
        .create_service(Service {
            id: 0,
            name: "orphan-service".to_string(),
            domain: String::new(),
            service_type: "checkin".to_string(),
            interval: 60,
            allow_notifications: true,
            online: true,
        })
        .unwrap();
    assert_eq!(service.id, orphan.service_id);

    let report = f.sweeper.sweep(now + Duration::seconds(1)).unwrap();
    assert_eq!(report.went_overdue, 1);
    assert_eq!(f.monitor.failures(&orphan).unwrap().len(), 1);
    assert_eq!(f.example.runtime().queue_len(), 2);
}

#[test]
fn test_deleted_checkins_are_no_longer_tracked() {
    let f = fixture();
    let now = Utc::now();
    f.sweeper.sweep(now).unwrap();
    assert_eq!(f.sweeper.tracked(), 1);

    f.store.delete_checkin(f.checkin.id).unwrap();
    let report = f.sweeper.sweep(now + Duration::seconds(1)).unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(f.sweeper.tracked(), 0);
}
