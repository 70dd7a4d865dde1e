//! Canonical state, duplicate detection and edge-triggered alerting.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::types::{Alert, LogLine, LogStream, Severity, StateSnapshot, StreamRecord};

const ONLINE: &str = "online";
const RUNTIME_ERROR_PREVIEW: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub disk_warn_pct: f64,
    pub memory_critical_pct: f64,
    /// Memory must fall below this before the critical alert can fire again.
    pub memory_rearm_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            disk_warn_pct: 85.0,
            memory_critical_pct: 90.0,
            memory_rearm_pct: 85.0,
        }
    }
}

// Previous values keyed by metric family, then identity.
#[derive(Debug, Default)]
struct PreviousValues {
    services: HashMap<String, String>,
    storage: HashMap<String, f64>,
    ram_critical: bool,
}

/// (previous state, new snapshot) -> alerts. Only `prev` and the id counter change.
#[derive(Debug)]
pub struct TransitionDetector {
    thresholds: Thresholds,
    prev: PreviousValues,
    stderr_alerts: bool,
    next_id: u64,
}

fn is_online(status: &str) -> bool {
    status.eq_ignore_ascii_case(ONLINE)
}

impl TransitionDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            prev: PreviousValues::default(),
            stderr_alerts: true,
            next_id: 0,
        }
    }

    pub fn with_stderr_alerts(mut self, on: bool) -> Self {
        self.stderr_alerts = on;
        self
    }

    fn alert(
        &mut self,
        severity: Severity,
        title: String,
        message: String,
        at: DateTime<Utc>,
    ) -> Alert {
        self.next_id += 1;
        Alert {
            id: format!("alert-{}", self.next_id),
            severity,
            title,
            message,
            timestamp: at,
        }
    }

    pub fn observe(&mut self, snap: &StateSnapshot, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for (name, status) in snap.tracked_statuses() {
            let previous = self
                .prev
                .services
                .insert(name.to_string(), status.to_string());
            // First sighting only sets the baseline.
            let Some(previous) = previous else { continue };
            if is_online(&previous) && !is_online(status) {
                alerts.push(self.alert(
                    Severity::Error,
                    format!("Service Critical: {name}"),
                    format!("State changed to {}", status.to_uppercase()),
                    now,
                ));
            } else if !is_online(&previous) && is_online(status) {
                alerts.push(self.alert(
                    Severity::Success,
                    format!("Service Restored: {name}"),
                    "Process is back online.".to_string(),
                    now,
                ));
            }
        }

        let disk = self.thresholds.disk_warn_pct;
        for vol in &snap.storage {
            let previous = self
                .prev
                .storage
                .insert(vol.drive.clone(), vol.percentage)
                .unwrap_or(0.0);
            if previous <= disk && vol.percentage > disk {
                alerts.push(self.alert(
                    Severity::Warning,
                    format!("Low Disk: {}", vol.drive),
                    format!("Threshold exceeded: {}%", vol.percentage),
                    now,
                ));
            }
        }

        if let Some(mem) = &snap.memory {
            let pct = mem.percentage;
            if !self.prev.ram_critical && pct > self.thresholds.memory_critical_pct {
                self.prev.ram_critical = true;
                alerts.push(self.alert(
                    Severity::Error,
                    "RAM Critical".to_string(),
                    format!("Usage at {pct}%"),
                    now,
                ));
            } else if pct < self.thresholds.memory_rearm_pct {
                self.prev.ram_critical = false;
            }
        }

        alerts
    }

    pub fn observe_log(&mut self, line: &LogLine) -> Option<Alert> {
        if !self.stderr_alerts || line.stream != LogStream::Err {
            return None;
        }
        let preview: String = line.text.chars().take(RUNTIME_ERROR_PREVIEW).collect();
        Some(self.alert(
            Severity::Error,
            format!("Runtime Error: {}", line.process_name),
            preview,
            line.timestamp,
        ))
    }
}

/// Sequence numbers already delivered, bounded with FIFO eviction.
#[derive(Debug)]
pub struct SeenRecords {
    set: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenRecords {
    pub fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` when `seq` had not been seen.
    pub fn insert(&mut self, seq: &str) -> bool {
        if self.set.contains(seq) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        self.set.insert(seq.to_string());
        self.order.push_back(seq.to_string());
        true
    }

    pub fn contains(&self, seq: &str) -> bool {
        self.set.contains(seq)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Already delivered under the same sequence number; dropped silently.
    Duplicate,
}

/// Holder of the one canonical snapshot plus the dedup and transition state.
#[derive(Debug)]
pub struct Reconciler {
    canonical: Option<Arc<StateSnapshot>>,
    detector: TransitionDetector,
    seen: SeenRecords,
}

impl Reconciler {
    pub fn new(thresholds: Thresholds, dedup_capacity: usize, stderr_alerts: bool) -> Self {
        Self {
            canonical: None,
            detector: TransitionDetector::new(thresholds).with_stderr_alerts(stderr_alerts),
            seen: SeenRecords::new(dedup_capacity),
        }
    }

    /// Swap in `snap` as the canonical state and report the transitions it causes.
    pub fn apply_snapshot(
        &mut self,
        snap: StateSnapshot,
        now: DateTime<Utc>,
    ) -> (Arc<StateSnapshot>, Vec<Alert>) {
        let alerts = self.detector.observe(&snap, now);
        let snap = Arc::new(snap);
        self.canonical = Some(Arc::clone(&snap));
        (snap, alerts)
    }

    pub fn admit_record(&mut self, record: &StreamRecord) -> Admission {
        if self.seen.insert(&record.sequence_number) {
            Admission::Accepted
        } else {
            Admission::Duplicate
        }
    }

    pub fn observe_log(&mut self, line: &LogLine) -> Option<Alert> {
        self.detector.observe_log(line)
    }

    pub fn current(&self) -> Option<Arc<StateSnapshot>> {
        self.canonical.clone()
    }

    pub fn has_seen(&self, seq: &str) -> bool {
        self.seen.contains(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemoryStats, ServiceInfo, StorageVolume};

    fn mem(pct: f64) -> StateSnapshot {
        StateSnapshot {
            memory: Some(MemoryStats {
                percentage: pct,
                ..MemoryStats::default()
            }),
            ..StateSnapshot::default()
        }
    }

    fn disk(pct: f64) -> StateSnapshot {
        StateSnapshot {
            storage: vec![StorageVolume {
                drive: "/".into(),
                percentage: pct,
                ..StorageVolume::default()
            }],
            ..StateSnapshot::default()
        }
    }

    fn service(status: &str) -> StateSnapshot {
        StateSnapshot {
            services: vec![ServiceInfo {
                name: "api".into(),
                status: status.into(),
                ..ServiceInfo::default()
            }],
            ..StateSnapshot::default()
        }
    }

    #[test]
    fn memory_alert_has_hysteresis() {
        let mut d = TransitionDetector::new(Thresholds::default());
        let now = Utc::now();
        let fired: usize = [70.0, 92.0, 93.0, 88.0, 70.0, 95.0]
            .into_iter()
            .map(|p| d.observe(&mem(p), now).len())
            .sum();
        assert_eq!(fired, 2);
    }

    #[test]
    fn disk_alert_is_edge_triggered() {
        let mut d = TransitionDetector::new(Thresholds::default());
        let now = Utc::now();
        let per_step: Vec<usize> = [50.0, 86.0, 90.0, 80.0, 87.0]
            .into_iter()
            .map(|p| d.observe(&disk(p), now).len())
            .collect();
        assert_eq!(per_step, vec![0, 1, 0, 0, 1]);
    }

    #[test]
    fn service_transitions_raise_critical_then_restored() {
        let mut d = TransitionDetector::new(Thresholds::default());
        let now = Utc::now();
        assert!(d.observe(&service("stopped"), now).is_empty(), "first sighting is a baseline");
        assert!(d.observe(&service("online"), now)[0].title.starts_with("Service Restored"));
        let critical = d.observe(&service("errored"), now);
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].severity, Severity::Error);
        assert_eq!(critical[0].message, "State changed to ERRORED");
        assert!(d.observe(&service("errored"), now).is_empty());
    }

    #[test]
    fn missing_memory_does_not_rearm() {
        let mut d = TransitionDetector::new(Thresholds::default());
        let now = Utc::now();
        assert_eq!(d.observe(&mem(95.0), now).len(), 1);
        assert!(d.observe(&StateSnapshot::default(), now).is_empty());
        assert!(d.observe(&mem(96.0), now).is_empty());
    }

    #[test]
    fn seen_records_forget_oldest_beyond_capacity() {
        let mut seen = SeenRecords::new(2);
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));
        assert!(seen.insert("b"));
        assert!(seen.insert("c"));
        assert!(!seen.contains("a"));
        assert_eq!(seen.len(), 2);
    }
}
