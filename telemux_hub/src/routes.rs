//! Control-plane gateway: health, push ingest, history and the live channel upgrade.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::adapters::{record_from_event, snapshot_from_agent, IngestEnvelope};
use crate::error::{HubError, Result};
use crate::poller::RecordKey;
use crate::reconciler::Admission;
use crate::state::AppState;
use crate::types::{HistoryEntry, SnapshotSource};
use crate::ws::ws_handler;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/agent_data", post(agent_data))
        .route("/api/stream-data", get(stream_data))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

#[derive(Debug, Default, Serialize)]
struct Rejected {
    field: &'static str,
    error: String,
}

#[derive(Debug, Default, Serialize)]
struct IngestReply {
    accepted: Vec<&'static str>,
    duplicates: Vec<&'static str>,
    rejected: Vec<Rejected>,
}

/// Each part of the envelope is handled on its own; one bad part does not sink the rest.
async fn ingest(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Response> {
    let envelope: IngestEnvelope = serde_json::from_value(body)
        .map_err(|e| HubError::malformed(format!("ingest body: {e}")))?;
    if envelope.is_empty() {
        return Err(HubError::malformed(
            "expected at least one of stats, kinesis_event, log",
        ));
    }

    let translated = envelope.translate(Utc::now());
    let mut reply = IngestReply::default();
    for (field, ev) in translated.events {
        match state.hub.publish(ev) {
            Admission::Accepted => reply.accepted.push(field),
            Admission::Duplicate => reply.duplicates.push(field),
        }
    }
    for (field, err) in translated.rejected {
        warn!(event = "ingest_rejected", field, error = %err);
        reply.rejected.push(Rejected {
            field,
            error: err.to_string(),
        });
    }

    let status = if reply.accepted.is_empty() && reply.duplicates.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status, Json(reply)).into_response())
}

/// Bare agent stats object, as agents post it without an envelope.
async fn agent_data(State(state): State<AppState>, Json(body): Json<Value>) -> Result<&'static str> {
    let snap = snapshot_from_agent(body, SnapshotSource::LiveAgent).inspect_err(|e| {
        warn!(event = "agent_data_rejected", error = %e);
    })?;
    state.hub.publish_snapshot(snap);
    Ok("OK")
}

/// Newest records first, in the shape the dashboard history table expects.
async fn stream_data(State(state): State<AppState>) -> Result<Json<Vec<HistoryEntry>>> {
    let limit = state.history_page_size;
    let Some(store) = state.store.as_ref() else {
        let entries = state
            .hub
            .recent_records(limit)
            .into_iter()
            .map(|r| HistoryEntry::from((*r).clone()))
            .collect();
        return Ok(Json(entries));
    };

    let items = store.recent(limit).await.inspect_err(|e| {
        warn!(event = "history_store_failed", error = %e);
    })?;
    let now = Utc::now();
    let mut records: Vec<_> = items
        .into_iter()
        .filter_map(|item| record_from_event(item, now).ok())
        .collect();
    records.sort_by(|a, b| {
        RecordKey::new(b.sequence_number.as_str()).cmp(&RecordKey::new(a.sequence_number.as_str()))
    });
    records.truncate(limit);
    info!(event = "history_served", count = records.len());
    Ok(Json(records.into_iter().map(HistoryEntry::from).collect()))
}
