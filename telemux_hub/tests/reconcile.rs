//! Reconciliation scenarios driven through the hub, as producers would.
use std::sync::Arc;

use serde_json::json;
use telemux_hub::adapters::{record_from_event, snapshot_from_agent};
use telemux_hub::reconciler::Admission;
use telemux_hub::types::{Severity, SnapshotSource};
use telemux_hub::{Hub, HubConfig};

fn push_stats(hub: &Hub, stats: serde_json::Value) -> usize {
    let snap = snapshot_from_agent(stats, SnapshotSource::LiveAgent).expect("valid stats");
    hub.publish_snapshot(snap)
}

#[test]
fn ram_critical_fires_twice_over_hysteresis_sequence() {
    let hub = Hub::new(HubConfig::default());
    for pct in [70.0, 92.0, 93.0, 88.0, 70.0, 95.0] {
        push_stats(&hub, json!({ "memory": { "percentage": pct, "used": 1.0, "total": 2.0 } }));
    }
    let ram: Vec<_> = hub
        .recent_alerts()
        .into_iter()
        .filter(|a| a.title == "RAM Critical")
        .collect();
    assert_eq!(ram.len(), 2);
    assert!(ram.iter().all(|a| a.severity == Severity::Error));
}

#[test]
fn service_going_offline_raises_exactly_one_critical() {
    let hub = Hub::new(HubConfig::default());
    push_stats(&hub, json!({ "processes": [{ "pid": 10, "name": "api", "status": "online" }] }));
    let raised = push_stats(&hub, json!({ "processes": [{ "pid": 10, "name": "api", "status": "stopped" }] }));
    assert_eq!(raised, 1);

    let alerts = hub.recent_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Error);
    assert_eq!(alerts[0].title, "Service Critical: api");
    assert_eq!(alerts[0].message, "State changed to STOPPED");
}

#[test]
fn snapshot_is_replaced_wholesale() {
    let hub = Hub::new(HubConfig::default());
    push_stats(&hub, json!({ "cpu": { "usage": 10 }, "memory": { "percentage": 20 } }));
    push_stats(&hub, json!({ "cpu": { "usage": 30 } }));
    let current = hub.current_snapshot().expect("snapshot present");
    assert_eq!(current.cpu.as_ref().map(|c| c.usage), Some(30.0));
    assert!(current.memory.is_none(), "fields are never merged across snapshots");
}

#[test]
fn low_disk_is_edge_triggered_per_volume() {
    let hub = Hub::new(HubConfig::default());
    let disks = |root: f64, data: f64| {
        json!({ "storage": [
            { "drive": "/", "percentage": root, "used": 1, "total": 2 },
            { "drive": "/data", "percentage": data, "used": 1, "total": 2 }
        ] })
    };
    assert_eq!(push_stats(&hub, disks(50.0, 90.0)), 1, "first sighting compares against zero");
    assert_eq!(push_stats(&hub, disks(86.0, 91.0)), 1);
    assert_eq!(push_stats(&hub, disks(87.0, 92.0)), 0);
    let titles: Vec<_> = hub.recent_alerts().iter().map(|a| a.title.clone()).collect();
    assert_eq!(titles, vec!["Low Disk: /data".to_string(), "Low Disk: /".to_string()]);
}

#[test]
fn same_sequence_number_is_admitted_once() {
    let hub = Arc::new(Hub::new(HubConfig::default()));
    let raw = json!({
        "id": "K1",
        "sequenceNumber": "ABC123",
        "data": { "user": "Alice", "action": "login", "page": "/home" }
    });
    let now = chrono::Utc::now();
    let first = hub.publish_record(record_from_event(raw.clone(), now).unwrap());
    let second = hub.publish_record(record_from_event(raw, now).unwrap());
    assert_eq!((first, second), (Admission::Accepted, Admission::Duplicate));
    assert_eq!(hub.stats().records, 1);
    assert!(hub.has_seen("ABC123"));
}
