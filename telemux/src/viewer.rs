//! Viewer-side state: what has been shown, and de-duplication of replays.
//!
//! The hub replays its buffers to every new connection, so after a reconnect the
//! same records, logs and alerts arrive again. They are keyed by identity and
//! shown once.

use std::collections::{HashSet, VecDeque};

use crate::history::Feed;
use crate::types::{Alert, LogLine, Record, ReplaySummary, Stats, ViewerEvent};

const SEEN_LIMIT: usize = 10_000;

#[derive(Debug)]
pub struct FeedState {
    pub stats: Option<Stats>,
    pub records: Feed<Record>,
    pub logs: Feed<LogLine>,
    pub alerts: Feed<Alert>,
    pub replays: usize,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
}

impl FeedState {
    pub fn new(cap: usize) -> Self {
        Self {
            stats: None,
            records: Feed::new(cap),
            logs: Feed::new(cap),
            alerts: Feed::new(cap),
            replays: 0,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
        }
    }

    // true when `key` is new
    fn first_sighting(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.seen_order.len() == SEEN_LIMIT {
            if let Some(old) = self.seen_order.pop_front() {
                self.seen.remove(&old);
            }
        }
        self.seen.insert(key.clone());
        self.seen_order.push_back(key);
        true
    }

    /// Apply one event. Returns the line to show, or `None` for an already seen item.
    pub fn apply(&mut self, ev: ViewerEvent) -> Option<String> {
        match ev {
            ViewerEvent::Stats(s) => {
                let line = render_stats(&s);
                self.stats = Some(s);
                Some(line)
            }
            ViewerEvent::Record(r) => {
                if !self.first_sighting(format!("rec:{}", r.sequence_number)) {
                    return None;
                }
                let line = render_record(&r);
                self.records.push(r);
                Some(line)
            }
            ViewerEvent::Log { agent, line } => {
                let key = format!("log:{}:{}:{}", line.timestamp.timestamp_micros(), line.process, line.data);
                if !self.first_sighting(key) {
                    return None;
                }
                let out = render_log(agent, &line);
                self.logs.push(line);
                Some(out)
            }
            ViewerEvent::Alert(a) => {
                if !self.first_sighting(format!("alert:{}:{}", a.id, a.timestamp.timestamp_micros())) {
                    return None;
                }
                let line = render_alert(&a);
                self.alerts.push(a);
                Some(line)
            }
            ViewerEvent::ReplayComplete(summary) => {
                self.replays += 1;
                Some(render_replay(&summary))
            }
            ViewerEvent::Unknown(_) => None,
        }
    }
}

pub fn render_stats(s: &Stats) -> String {
    let host = s
        .system
        .as_ref()
        .map(|sys| sys.hostname.as_str())
        .filter(|h| !h.is_empty())
        .unwrap_or("-");
    let cpu = s
        .cpu
        .as_ref()
        .map_or_else(|| "-".to_string(), |c| format!("{:.1}%", c.usage));
    let mem = s
        .memory
        .as_ref()
        .map_or_else(|| "-".to_string(), |m| format!("{:.1}%", m.percentage));
    let online = s
        .pm2
        .iter()
        .filter(|p| p.status.eq_ignore_ascii_case("online"))
        .count();
    format!(
        "[stats] host={host} cpu={cpu} mem={mem} disks={} services={}/{} ({})",
        s.storage.len(),
        online,
        s.pm2.len(),
        if s.source.is_empty() { "live_agent" } else { s.source.as_str() }
    )
}

pub fn render_record(r: &Record) -> String {
    format!(
        "[record] {} {} {} {} {}",
        r.approximate_arrival_timestamp.format("%H:%M:%S"),
        r.sequence_number,
        r.data.user,
        r.data.action,
        r.data.page
    )
}

pub fn render_log(agent: bool, l: &LogLine) -> String {
    let tag = if agent { "agent_log" } else { "pm2_log" };
    let stream = if l.stream.is_empty() { "out" } else { l.stream.as_str() };
    format!(
        "[{tag}] {} {} | {stream} | {}",
        l.timestamp.format("%H:%M:%S"),
        l.process,
        l.data.trim_end()
    )
}

pub fn render_alert(a: &Alert) -> String {
    format!(
        "[{}] {} {}: {}",
        a.severity.to_ascii_uppercase(),
        a.timestamp.format("%H:%M:%S"),
        a.title,
        a.message
    )
}

pub fn render_replay(s: &ReplaySummary) -> String {
    format!(
        "-- replay complete: snapshot={} records={} logs={} alerts={} --",
        if s.snapshot { "yes" } else { "no" },
        s.records,
        s.logs,
        s.alerts
    )
}
