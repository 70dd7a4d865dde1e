//! Broadcast hub: canonical state, replay buffers and the set of live viewers.
//!
//! Every mutation (snapshot swap, ring append, fan-out enqueue) happens inside one
//! critical section, so each viewer sees events in system-wide arrival order and a
//! connecting viewer's replay cut lines up exactly with its first live event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info};

use crate::event::{CanonicalEvent, HubEvent, Outbound, ReplaySummary};
use crate::reconciler::{Admission, Reconciler, Thresholds};
use crate::ring::RingBuffer;
use crate::types::{Alert, LogLine, StateSnapshot, StreamRecord};
use crate::viewer::{PushOutcome, ViewerPhase, ViewerQueue};

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub record_capacity: usize,
    pub log_capacity: usize,
    pub alert_capacity: usize,
    /// Live items a viewer may have pending before shedding starts.
    pub viewer_queue: usize,
    pub dedup_capacity: usize,
    pub thresholds: Thresholds,
    pub stderr_alerts: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            record_capacity: 100,
            log_capacity: 200,
            alert_capacity: 50,
            viewer_queue: 256,
            dedup_capacity: 10_000,
            thresholds: Thresholds::default(),
            stderr_alerts: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub records: usize,
    pub logs: usize,
    pub alerts: usize,
    pub viewers: usize,
    pub has_snapshot: bool,
}

struct HubInner {
    reconciler: Reconciler,
    records: RingBuffer<StreamRecord>,
    logs: RingBuffer<LogLine>,
    alerts: RingBuffer<Alert>,
    viewers: HashMap<u64, Arc<ViewerQueue>>,
}

impl HubInner {
    fn fan_out(&mut self, ev: &HubEvent) {
        let mut closed = Vec::new();
        for (id, queue) in &self.viewers {
            match queue.push(ev.clone()) {
                PushOutcome::Queued | PushOutcome::Collapsed => {}
                PushOutcome::Dropped(class) => {
                    debug!(viewer_id = id, ?class, "slow viewer, shed one item");
                }
                PushOutcome::Closed => closed.push(*id),
            }
        }
        for id in closed {
            self.viewers.remove(&id);
        }
    }

    fn raise(&mut self, alert: Alert) {
        info!(event = "alert", title = %alert.title, severity = ?alert.severity);
        let alert = Arc::new(alert);
        self.alerts.append(Arc::clone(&alert));
        self.fan_out(&HubEvent::Alert(alert));
    }
}

pub struct Hub {
    inner: Mutex<HubInner>,
    next_viewer: AtomicU64,
    viewer_queue: usize,
}

impl Hub {
    pub fn new(cfg: HubConfig) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                reconciler: Reconciler::new(cfg.thresholds, cfg.dedup_capacity, cfg.stderr_alerts),
                records: RingBuffer::new(cfg.record_capacity),
                logs: RingBuffer::new(cfg.log_capacity),
                alerts: RingBuffer::new(cfg.alert_capacity),
                viewers: HashMap::new(),
            }),
            next_viewer: AtomicU64::new(1),
            viewer_queue: cfg.viewer_queue,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Single entry point for producer adapters. Snapshots and logs are always
    /// accepted; records may be duplicates.
    pub fn publish(&self, ev: CanonicalEvent) -> Admission {
        match ev {
            CanonicalEvent::Snapshot(s) => {
                self.publish_snapshot(s);
                Admission::Accepted
            }
            CanonicalEvent::Record(r) => self.publish_record(r),
            CanonicalEvent::Log(l) => {
                self.publish_log(l);
                Admission::Accepted
            }
        }
    }

    /// Replace the canonical snapshot and broadcast it, then any alerts it caused.
    /// Returns the number of alerts raised.
    pub fn publish_snapshot(&self, snap: StateSnapshot) -> usize {
        let mut inner = self.lock();
        let (snap, alerts) = inner.reconciler.apply_snapshot(snap, Utc::now());
        inner.fan_out(&HubEvent::Snapshot(snap));
        let raised = alerts.len();
        for alert in alerts {
            inner.raise(alert);
        }
        raised
    }

    pub fn publish_record(&self, record: StreamRecord) -> Admission {
        let mut inner = self.lock();
        let admission = inner.reconciler.admit_record(&record);
        match admission {
            Admission::Accepted => {
                debug!(event = "record", seq = %record.sequence_number, user = %record.data.user);
                let record = Arc::new(record);
                inner.records.append(Arc::clone(&record));
                inner.fan_out(&HubEvent::Record(record));
            }
            Admission::Duplicate => {
                debug!(seq = %record.sequence_number, "duplicate record dropped");
            }
        }
        admission
    }

    pub fn publish_log(&self, line: LogLine) {
        let mut inner = self.lock();
        let alert = inner.reconciler.observe_log(&line);
        let line = Arc::new(line);
        inner.logs.append(Arc::clone(&line));
        inner.fan_out(&HubEvent::Log(line));
        if let Some(alert) = alert {
            inner.raise(alert);
        }
    }

    /// Register a viewer. Its queue starts with the replay batch: the canonical
    /// snapshot, then records, logs and alerts, each oldest first.
    pub fn connect(self: &Arc<Self>) -> ViewerHandle {
        let id = self.next_viewer.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(ViewerQueue::new(id, self.viewer_queue));

        let mut inner = self.lock();
        let mut items = Vec::new();
        let snapshot = inner.reconciler.current();
        let summary = ReplaySummary {
            snapshot: snapshot.is_some(),
            records: inner.records.len(),
            logs: inner.logs.len(),
            alerts: inner.alerts.len(),
        };
        if let Some(s) = snapshot {
            items.push(HubEvent::Snapshot(s));
        }
        items.extend(inner.records.snapshot().into_iter().map(HubEvent::Record));
        items.extend(inner.logs.snapshot().into_iter().map(HubEvent::Log));
        items.extend(inner.alerts.snapshot().into_iter().map(HubEvent::Alert));
        queue.begin_replay(items, summary);
        inner.viewers.insert(id, Arc::clone(&queue));
        let viewers = inner.viewers.len();
        drop(inner);

        info!(event = "viewer_connected", viewer_id = id, viewers, replay = ?summary);
        ViewerHandle {
            hub: Arc::clone(self),
            queue,
        }
    }

    /// Close and forget a viewer. Idempotent.
    pub fn disconnect(&self, id: u64) {
        let removed = self.lock().viewers.remove(&id);
        if let Some(queue) = removed {
            queue.close();
            let dropped = queue.dropped();
            info!(
                event = "viewer_disconnected",
                viewer_id = id,
                shed = dropped.total()
            );
        }
    }

    pub fn current_snapshot(&self) -> Option<Arc<StateSnapshot>> {
        self.lock().reconciler.current()
    }

    pub fn has_seen(&self, seq: &str) -> bool {
        self.lock().reconciler.has_seen(seq)
    }

    /// Up to `limit` buffered records, newest first.
    pub fn recent_records(&self, limit: usize) -> Vec<Arc<StreamRecord>> {
        let mut records = self.lock().records.snapshot();
        records.reverse();
        records.truncate(limit);
        records
    }

    pub fn recent_logs(&self) -> Vec<Arc<LogLine>> {
        self.lock().logs.snapshot()
    }

    pub fn recent_alerts(&self) -> Vec<Arc<Alert>> {
        self.lock().alerts.snapshot()
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.lock();
        BufferStats {
            records: inner.records.len(),
            logs: inner.logs.len(),
            alerts: inner.alerts.len(),
            viewers: inner.viewers.len(),
            has_snapshot: inner.reconciler.current().is_some(),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// A connected viewer. Dropping it disconnects.
pub struct ViewerHandle {
    hub: Arc<Hub>,
    queue: Arc<ViewerQueue>,
}

impl ViewerHandle {
    pub fn id(&self) -> u64 {
        self.queue.id()
    }

    pub fn queue(&self) -> Arc<ViewerQueue> {
        Arc::clone(&self.queue)
    }

    pub async fn next(&self) -> Option<Outbound> {
        self.queue.next().await
    }

    pub fn try_next(&self) -> Option<Outbound> {
        self.queue.try_next()
    }

    pub fn phase(&self) -> ViewerPhase {
        self.queue.phase()
    }
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        self.hub.disconnect(self.queue.id());
    }
}
