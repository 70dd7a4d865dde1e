//! Wire types shared by the ingest paths and the live channel.
//! Field names follow what agents and viewers already speak, so keep them stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    pub usage: f64,
    pub cores: u32,
    // GHz
    pub speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub percentage: f64,
    // GiB
    pub used: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageVolume {
    pub drive: String,
    pub percentage: f64,
    pub used: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    #[serde(rename = "iface", alias = "interface")]
    pub interface: String,
    // KiB, cumulative
    pub rx: f64,
    pub tx: f64,
    #[serde(rename = "operstate", alias = "operationalState")]
    pub operational_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    #[serde(rename = "cpu", alias = "cpuPercent")]
    pub cpu_percent: f64,
    #[serde(rename = "mem", alias = "memMB")]
    pub mem_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A supervised service as reported by the process manager (`pm2` list).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarts: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemIdentity {
    pub hostname: String,
    pub platform: String,
    #[serde(rename = "uptime", alias = "uptimeSeconds")]
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distro: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    #[default]
    LiveAgent,
    Replayed,
}

/// Point-in-time system metrics. Replaced wholesale on every arrival.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryStats>,
    #[serde(default)]
    pub storage: Vec<StorageVolume>,
    #[serde(default)]
    pub network: Vec<NetworkInterface>,
    #[serde(default)]
    pub processes: Vec<ProcessInfo>,
    #[serde(default, rename = "pm2", alias = "services")]
    pub services: Vec<ServiceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub source: SnapshotSource,
}

impl StateSnapshot {
    /// (name, status) for everything whose liveness is tracked across snapshots:
    /// supervised services first, then plain processes that carry a status.
    pub fn tracked_statuses(&self) -> impl Iterator<Item = (&str, &str)> {
        let services = self
            .services
            .iter()
            .map(|s| (s.name.as_str(), s.status.as_str()));
        let processes = self
            .processes
            .iter()
            .filter_map(|p| p.status.as_deref().map(|st| (p.name.as_str(), st)));
        services.chain(processes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientMeta {
    pub browser: String,
    pub os: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Host metrics some producers embed in a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMetrics {
    pub cpu: f64,
    pub memory_pct: f64,
    pub memory_used_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    pub user: String,
    pub action: String,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub meta: ClientMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_metrics: Option<RawMetrics>,
}

/// A user/system action. Identity is `sequence_number`, whichever producer delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub id: String,
    pub sequence_number: String,
    pub data: RecordData,
    pub approximate_arrival_timestamp: DateTime<Utc>,
}

/// Shape served by the historical query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub sequence_number: String,
    pub data: RecordData,
    pub timestamp: DateTime<Utc>,
}

impl From<StreamRecord> for HistoryEntry {
    fn from(r: StreamRecord) -> Self {
        Self {
            id: r.id,
            sequence_number: r.sequence_number,
            data: r.data,
            timestamp: r.approximate_arrival_timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    #[default]
    Out,
    Err,
}

impl LogStream {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "err" | "error" | "stderr" => LogStream::Err,
            _ => LogStream::Out,
        }
    }
}

/// Which producer a log line came from; decides the live-channel event name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogOrigin {
    #[default]
    ProcessBus,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(rename = "process")]
    pub process_name: String,
    #[serde(rename = "data")]
    pub text: String,
    #[serde(rename = "type", default)]
    pub stream: LogStream,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub origin: LogOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
