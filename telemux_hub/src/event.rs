//! Canonical events flowing through the hub, and the frames they become on the live channel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Alert, LogLine, LogOrigin, StateSnapshot, StreamRecord};

pub const SERVER_STATS: &str = "server_stats";
pub const KINESIS_DATA: &str = "kinesis_data";
pub const PM2_LOG: &str = "pm2_log";
pub const AGENT_LOG: &str = "agent_log";
pub const NOTIFICATION: &str = "notification";
pub const REPLAY_COMPLETE: &str = "replay_complete";

// viewer -> hub
pub const PM2_ACTION: &str = "pm2_action";
pub const AGENT_METRICS: &str = "agent_metrics";

/// What a producer adapter hands to the hub.
#[derive(Debug, Clone)]
pub enum CanonicalEvent {
    Snapshot(StateSnapshot),
    Record(StreamRecord),
    Log(LogLine),
}

/// What the hub hands to viewers. Payloads are shared, never copied per viewer.
#[derive(Debug, Clone)]
pub enum HubEvent {
    Snapshot(Arc<StateSnapshot>),
    Record(Arc<StreamRecord>),
    Log(Arc<LogLine>),
    Alert(Arc<Alert>),
}

/// Shedding order under backpressure, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropClass {
    Log,
    Record,
    Alert,
    Snapshot,
}

#[derive(Serialize)]
struct Frame<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}

fn frame<T: Serialize>(event: &str, data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Frame { event, data })
}

impl HubEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HubEvent::Snapshot(_) => SERVER_STATS,
            HubEvent::Record(_) => KINESIS_DATA,
            HubEvent::Log(l) => match l.origin {
                LogOrigin::ProcessBus => PM2_LOG,
                LogOrigin::Agent => AGENT_LOG,
            },
            HubEvent::Alert(_) => NOTIFICATION,
        }
    }

    pub fn class(&self) -> DropClass {
        match self {
            HubEvent::Snapshot(_) => DropClass::Snapshot,
            HubEvent::Record(_) => DropClass::Record,
            HubEvent::Log(_) => DropClass::Log,
            HubEvent::Alert(_) => DropClass::Alert,
        }
    }

    pub fn frame(&self) -> Result<String, serde_json::Error> {
        let name = self.name();
        match self {
            HubEvent::Snapshot(s) => frame(name, s.as_ref()),
            HubEvent::Record(r) => frame(name, r.as_ref()),
            HubEvent::Log(l) => frame(name, l.as_ref()),
            HubEvent::Alert(a) => frame(name, a.as_ref()),
        }
    }
}

/// Counts of what a new viewer was replayed before going live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub snapshot: bool,
    pub records: usize,
    pub logs: usize,
    pub alerts: usize,
}

/// One unit handed to a connection's writer.
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(HubEvent),
    ReplayComplete(ReplaySummary),
}

impl Outbound {
    pub fn frame(&self) -> Result<String, serde_json::Error> {
        match self {
            Outbound::Event(ev) => ev.frame(),
            Outbound::ReplayComplete(summary) => frame(REPLAY_COMPLETE, summary),
        }
    }
}

/// Viewer -> hub message.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Process control intent sent by a viewer. Accepted and logged only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlAction {
    pub action: String,
    pub name: String,
}
