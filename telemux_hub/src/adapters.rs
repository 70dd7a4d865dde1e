//! Producer adapters: raw producer payloads in, canonical events out.
//!
//! Unknown fields are ignored. A payload missing what the hub needs to identify or
//! place it is rejected with `MalformedPayload`; nothing here panics on input.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{HubError, Result};
use crate::event::CanonicalEvent;
use crate::types::{
    CpuStats, LogLine, LogOrigin, LogStream, MemoryStats, RecordData, SnapshotSource,
    StateSnapshot, StreamRecord, SystemIdentity,
};

// A stats object must carry at least one of these to count as a snapshot.
const SNAPSHOT_FAMILIES: [&str; 8] = [
    "cpu",
    "memory",
    "storage",
    "network",
    "processes",
    "pm2",
    "services",
    "system",
];

const SEQUENCE_FIELDS: [&str; 3] = ["sequenceNumber", "sequence_number", "SequenceNumber"];
const ARRIVAL_FIELDS: [&str; 2] = ["approximateArrivalTimestamp", "timestamp"];

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| obj.get(*n))
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_time(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Agent push payload (`stats`) -> snapshot.
pub fn snapshot_from_agent(raw: Value, source: SnapshotSource) -> Result<StateSnapshot> {
    {
        let obj = raw
            .as_object()
            .ok_or_else(|| HubError::malformed("stats must be a JSON object"))?;
        if obj.get("loading").and_then(Value::as_bool) == Some(true) {
            return Err(HubError::malformed("agent reported a loading placeholder"));
        }
        if !SNAPSHOT_FAMILIES.iter().any(|k| obj.contains_key(*k)) {
            return Err(HubError::malformed("stats carries no metric family"));
        }
    }
    let mut snap: StateSnapshot =
        serde_json::from_value(raw).map_err(|e| HubError::malformed(format!("stats: {e}")))?;
    snap.source = source;
    Ok(snap)
}

/// Sequence number of a record-shaped value, if it has one.
pub fn sequence_of(raw: &Value) -> Option<String> {
    raw.as_object()
        .and_then(|obj| field(obj, &SEQUENCE_FIELDS))
        .and_then(scalar_string)
}

/// Record envelope (`kinesis_event` or a store item) -> record.
///
/// `data` may be an object or a JSON-encoded string. `sequenceNumber`, `data.user`
/// and `data.action` are required; a missing `id` falls back to the sequence tail.
pub fn record_from_event(raw: Value, arrival: DateTime<Utc>) -> Result<StreamRecord> {
    let obj = raw
        .as_object()
        .ok_or_else(|| HubError::malformed("record must be a JSON object"))?;
    let sequence_number =
        sequence_of(&raw).ok_or_else(|| HubError::malformed("record has no sequenceNumber"))?;

    let data = match obj.get("data") {
        Some(Value::String(s)) => serde_json::from_str::<RecordData>(s),
        Some(v @ Value::Object(_)) => RecordData::deserialize(v),
        _ => return Err(HubError::malformed("record has no data object")),
    }
    .map_err(|e| HubError::malformed(format!("record data: {e}")))?;
    if data.user.is_empty() || data.action.is_empty() {
        return Err(HubError::malformed("record data needs user and action"));
    }

    let id = obj
        .get("id")
        .and_then(scalar_string)
        .unwrap_or_else(|| tail(&sequence_number, 8));
    let arrival = field(obj, &ARRIVAL_FIELDS)
        .and_then(parse_time)
        .unwrap_or(arrival);

    Ok(StreamRecord {
        id,
        sequence_number,
        data,
        approximate_arrival_timestamp: arrival,
    })
}

fn tail(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

/// Snapshot derived from host metrics embedded in a record, if any.
pub fn snapshot_from_raw_metrics(record: &StreamRecord) -> Option<StateSnapshot> {
    let m = record.data.raw_metrics.as_ref()?;
    Some(StateSnapshot {
        cpu: Some(CpuStats {
            usage: m.cpu,
            ..CpuStats::default()
        }),
        memory: Some(MemoryStats {
            percentage: m.memory_pct,
            used: m.memory_used_gb,
            total: 0.0,
        }),
        system: Some(SystemIdentity {
            hostname: record.data.user.clone(),
            ..SystemIdentity::default()
        }),
        timestamp: Some(record.data.timestamp.clone()).filter(|t| !t.is_empty()),
        source: SnapshotSource::Replayed,
        ..StateSnapshot::default()
    })
}

/// Process name, text and stream out of the shapes process managers emit:
/// `{app_name, message, type}`, `{process: {name}, data, at}`, `{process, data, type}`.
fn log_parts(obj: &Map<String, Value>) -> (Option<String>, Option<String>, Option<LogStream>) {
    let process = obj
        .get("app_name")
        .and_then(Value::as_str)
        .or_else(|| {
            obj.get("process")
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
        })
        .or_else(|| obj.get("process").and_then(Value::as_str))
        .or_else(|| obj.get("processName").and_then(Value::as_str))
        .map(str::to_string);
    let text = ["message", "data", "text"]
        .iter()
        .find_map(|k| obj.get(*k))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        });
    let stream = ["type", "stream"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(LogStream::parse);
    (process, text, stream)
}

/// One line from the log bus. Non-JSON lines are kept verbatim under `label`.
pub fn log_from_bus_line(
    line: &str,
    label: &str,
    default_stream: LogStream,
    now: DateTime<Utc>,
) -> Result<LogLine> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return Err(HubError::malformed("empty log line"));
    }
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
        let (process, text, stream) = log_parts(&obj);
        let text = text.ok_or_else(|| HubError::malformed("log record has no text"))?;
        let timestamp = ["at", "timestamp"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(parse_time))
            .unwrap_or(now);
        return Ok(LogLine {
            process_name: process.unwrap_or_else(|| label.to_string()),
            text,
            stream: stream.unwrap_or(default_stream),
            timestamp,
            origin: LogOrigin::ProcessBus,
        });
    }
    Ok(LogLine {
        process_name: label.to_string(),
        text: trimmed.to_string(),
        stream: default_stream,
        timestamp: now,
        origin: LogOrigin::ProcessBus,
    })
}

/// Log line pushed by an agent (ingest `log` field or `agent_log` frame).
pub fn log_from_agent(raw: Value, now: DateTime<Utc>) -> Result<LogLine> {
    let obj = raw
        .as_object()
        .ok_or_else(|| HubError::malformed("log must be a JSON object"))?;
    let (process, text, stream) = log_parts(obj);
    let text = text.ok_or_else(|| HubError::malformed("log has no text"))?;
    let timestamp = obj.get("timestamp").and_then(parse_time).unwrap_or(now);
    Ok(LogLine {
        process_name: process.unwrap_or_else(|| "agent".to_string()),
        text,
        stream: stream.unwrap_or_default(),
        timestamp,
        origin: LogOrigin::Agent,
    })
}

/// Push-ingest body. Every part is optional and forwarded independently.
#[derive(Debug, Default, Deserialize)]
pub struct IngestEnvelope {
    #[serde(default)]
    pub stats: Option<Value>,
    #[serde(default)]
    pub kinesis_event: Option<Value>,
    #[serde(default)]
    pub log: Option<Value>,
}

/// Parts of an envelope that translated, and the ones that did not.
#[derive(Debug, Default)]
pub struct Translated {
    pub events: Vec<(&'static str, CanonicalEvent)>,
    pub rejected: Vec<(&'static str, HubError)>,
}

impl IngestEnvelope {
    pub fn is_empty(&self) -> bool {
        self.stats.is_none() && self.kinesis_event.is_none() && self.log.is_none()
    }

    pub fn translate(self, now: DateTime<Utc>) -> Translated {
        let mut out = Translated::default();
        if let Some(stats) = self.stats {
            match snapshot_from_agent(stats, SnapshotSource::LiveAgent) {
                Ok(s) => out.events.push(("stats", CanonicalEvent::Snapshot(s))),
                Err(e) => out.rejected.push(("stats", e)),
            }
        }
        if let Some(ev) = self.kinesis_event {
            match record_from_event(ev, now) {
                Ok(r) => out.events.push(("kinesis_event", CanonicalEvent::Record(r))),
                Err(e) => out.rejected.push(("kinesis_event", e)),
            }
        }
        if let Some(log) = self.log {
            match log_from_agent(log, now) {
                Ok(l) => out.events.push(("log", CanonicalEvent::Log(l))),
                Err(e) => out.rejected.push(("log", e)),
            }
        }
        out
    }
}
