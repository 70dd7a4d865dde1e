//! Live channel: WebSocket upgrade and the per-connection reader/writer pair.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::adapters::{log_from_agent, snapshot_from_agent};
use crate::event::{ControlAction, InboundFrame, AGENT_LOG, AGENT_METRICS, PM2_ACTION};
use crate::hub::Hub;
use crate::state::AppState;
use crate::types::SnapshotSource;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    // Dropping the handle disconnects, whichever way this function exits.
    let viewer = state.hub.connect();
    let id = viewer.id();
    let queue = viewer.queue();
    let write_timeout = state.write_timeout;

    // The writer is the only task that touches the socket's send half, so a slow
    // viewer stalls nothing but itself.
    let mut writer = tokio::spawn(async move {
        while let Some(item) = queue.next().await {
            let text = match item.frame() {
                Ok(t) => t,
                Err(e) => {
                    warn!(viewer_id = id, error = %e, "frame encode failed");
                    continue;
                }
            };
            match timeout(write_timeout, sender.send(Message::Text(text))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(viewer_id = id, error = %e, "viewer write failed");
                    break;
                }
                Err(_) => {
                    warn!(event = "viewer_write_timeout", viewer_id = id);
                    break;
                }
            }
        }
        queue.close();
        let _ = timeout(write_timeout, sender.close()).await;
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            _ = &mut writer => {
                writer_done = true;
                break;
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_inbound(&state.hub, id, &text),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    drop(viewer);
    if !writer_done {
        let _ = writer.await;
    }
}

fn handle_inbound(hub: &Hub, viewer_id: u64, text: &str) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            debug!(viewer_id, error = %e, "non-frame message ignored");
            return;
        }
    };
    match frame.event.as_str() {
        PM2_ACTION => match serde_json::from_value::<ControlAction>(frame.data) {
            // Accepted, not acted on: process supervision lives outside the hub.
            Ok(a) => info!(event = "control_action", viewer_id, action = %a.action, name = %a.name),
            Err(e) => debug!(viewer_id, error = %e, "bad control action"),
        },
        AGENT_METRICS => match snapshot_from_agent(frame.data, SnapshotSource::LiveAgent) {
            Ok(snap) => {
                hub.publish_snapshot(snap);
            }
            Err(e) => warn!(event = "agent_metrics_rejected", viewer_id, error = %e),
        },
        AGENT_LOG => match log_from_agent(frame.data, Utc::now()) {
            Ok(line) => hub.publish_log(line),
            Err(e) => warn!(event = "agent_log_rejected", viewer_id, error = %e),
        },
        other => debug!(viewer_id, frame = other, "unknown inbound frame ignored"),
    }
}
