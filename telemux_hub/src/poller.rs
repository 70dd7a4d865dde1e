//! Cursor poller: pulls the store's newest records on a fixed interval and feeds
//! anything above the watermark into the hub, oldest first.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::adapters::{record_from_event, sequence_of, snapshot_from_raw_metrics};
use crate::hub::Hub;
use crate::reconciler::Admission;
use crate::store::RecordStore;

/// Store ordering key. Numeric keys (stream sequence numbers can exceed u128)
/// compare by magnitude, anything else lexicographically after them.
#[derive(Debug, Clone, Eq)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<&str> {
        if !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit()) {
            let trimmed = self.0.trim_start_matches('0');
            Some(if trimmed.is_empty() { "0" } else { trimmed })
        } else {
            None
        }
    }
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RecordKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

/// Highest key confirmed ingested. Only ever moves forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark(Option<RecordKey>);

impl Watermark {
    pub fn admits(&self, key: &RecordKey) -> bool {
        self.0.as_ref().map_or(true, |w| key > w)
    }

    /// Returns `true` if the watermark moved.
    pub fn advance(&mut self, key: RecordKey) -> bool {
        if self.admits(&key) {
            self.0 = Some(key);
            true
        } else {
            false
        }
    }

    pub fn get(&self) -> Option<&RecordKey> {
        self.0.as_ref()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub interval: Duration,
    pub page_size: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    /// Items above the watermark.
    pub fresh: usize,
    pub published: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub snapshots: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing above the watermark; no state change.
    Idle,
    Ingested(TickReport),
    /// Store failed; watermark untouched, retried next tick.
    StoreUnavailable,
}

pub struct CursorPoller {
    store: Arc<dyn RecordStore>,
    hub: Arc<Hub>,
    cfg: PollerConfig,
    watermark: Watermark,
}

impl CursorPoller {
    pub fn new(store: Arc<dyn RecordStore>, hub: Arc<Hub>, cfg: PollerConfig) -> Self {
        Self {
            store,
            hub,
            cfg,
            watermark: Watermark::default(),
        }
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let items = match self.store.recent(self.cfg.page_size).await {
            Ok(items) => items,
            Err(e) => {
                warn!(event = "store_poll_failed", error = %e);
                return TickOutcome::StoreUnavailable;
            }
        };

        let mut report = TickReport {
            fetched: items.len(),
            ..TickReport::default()
        };
        let mut fresh = Vec::with_capacity(items.len());
        for item in items {
            match sequence_of(&item) {
                Some(seq) => {
                    let key = RecordKey::new(seq);
                    if self.watermark.admits(&key) {
                        fresh.push((key, item));
                    }
                }
                None => {
                    debug!("store item without a sequence number skipped");
                    report.malformed += 1;
                }
            }
        }
        if fresh.is_empty() {
            return if report.malformed > 0 {
                TickOutcome::Ingested(report)
            } else {
                TickOutcome::Idle
            };
        }

        fresh.sort_by(|a, b| a.0.cmp(&b.0));
        fresh.dedup_by(|a, b| a.0 == b.0);
        report.fresh = fresh.len();

        let now = Utc::now();
        let mut highest = None;
        for (key, item) in fresh {
            highest = Some(key);
            let record = match record_from_event(item, now) {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "store item rejected");
                    report.malformed += 1;
                    continue;
                }
            };
            let derived = snapshot_from_raw_metrics(&record);
            match self.hub.publish_record(record) {
                Admission::Accepted => {
                    report.published += 1;
                    if let Some(snap) = derived {
                        self.hub.publish_snapshot(snap);
                        report.snapshots += 1;
                    }
                }
                Admission::Duplicate => report.duplicates += 1,
            }
        }
        // Even past items that failed validation, so they are not refetched forever.
        if let Some(key) = highest {
            self.watermark.advance(key);
        }

        if report.published > 0 {
            info!(
                event = "store_poll",
                published = report.published,
                duplicates = report.duplicates,
                malformed = report.malformed
            );
        }
        TickOutcome::Ingested(report)
    }

    pub async fn run(mut self) {
        let mut ticker = interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

pub fn spawn_poller(poller: CursorPoller) -> JoinHandle<()> {
    tokio::spawn(poller.run())
}
