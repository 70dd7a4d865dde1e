//! Types that mirror the hub's live-channel JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Cpu {
    pub usage: f64,
    pub cores: u32,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Memory {
    pub percentage: f64,
    pub used: f64,
    pub total: f64,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Volume {
    pub drive: String,
    pub percentage: f64,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Service {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SystemInfo {
    pub hostname: String,
    pub platform: String,
    pub uptime: u64,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Stats {
    pub cpu: Option<Cpu>,
    pub memory: Option<Memory>,
    pub storage: Vec<Volume>,
    pub pm2: Vec<Service>,
    pub system: Option<SystemInfo>,
    // "live_agent" or "replayed"
    pub source: String,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RecordData {
    pub user: String,
    pub action: String,
    pub page: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub sequence_number: String,
    pub data: RecordData,
    pub approximate_arrival_timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogLine {
    pub process: String,
    pub data: String,
    #[serde(rename = "type", default)]
    pub stream: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Alert {
    pub id: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ReplaySummary {
    pub snapshot: bool,
    pub records: usize,
    pub logs: usize,
    pub alerts: usize,
}

/// One decoded frame from the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Stats(Stats),
    Record(Record),
    /// `agent` is false for process-manager logs (`pm2_log`).
    Log { agent: bool, line: LogLine },
    Alert(Alert),
    ReplayComplete(ReplaySummary),
    Unknown(String),
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ViewerEvent {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let Frame { event, data } = serde_json::from_str(text)?;
        Ok(match event.as_str() {
            "server_stats" => ViewerEvent::Stats(serde_json::from_value(data)?),
            "kinesis_data" => ViewerEvent::Record(serde_json::from_value(data)?),
            "pm2_log" => ViewerEvent::Log {
                agent: false,
                line: serde_json::from_value(data)?,
            },
            "agent_log" => ViewerEvent::Log {
                agent: true,
                line: serde_json::from_value(data)?,
            },
            "notification" => ViewerEvent::Alert(serde_json::from_value(data)?),
            "replay_complete" => ViewerEvent::ReplayComplete(serde_json::from_value(data)?),
            _ => ViewerEvent::Unknown(event),
        })
    }
}

/// Process control request sent to the hub.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ControlAction {
    pub action: String,
    pub name: String,
}

impl ControlAction {
    /// Parse `ACTION:NAME`, e.g. `restart:api`.
    pub fn parse(s: &str) -> Option<Self> {
        let (action, name) = s.split_once(':')?;
        let (action, name) = (action.trim(), name.trim());
        if action.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            action: action.to_string(),
            name: name.to_string(),
        })
    }

    pub fn to_frame(&self) -> String {
        serde_json::json!({ "event": "pm2_action", "data": self }).to_string()
    }
}
