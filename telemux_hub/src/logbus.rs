//! Log-bus listener: runs the configured command and tails its output line by line.
//!
//! The command is opaque (typically a process manager's log stream). stdout lines
//! default to the `out` stream, stderr lines to `err`. When it cannot start or
//! exits, the listener waits and starts it again.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::adapters::log_from_bus_line;
use crate::error::{HubError, Result};
use crate::hub::Hub;
use crate::types::LogStream;

#[derive(Debug, Clone)]
pub struct LogBusConfig {
    pub command: String,
    pub retry: Duration,
}

impl LogBusConfig {
    /// Name used for lines that do not say which process wrote them.
    pub fn label(&self) -> String {
        self.command
            .split_whitespace()
            .next()
            .and_then(|first| first.rsplit('/').next())
            .unwrap_or("logbus")
            .to_string()
    }
}

/// Feed every line of `reader` to the hub. Returns how many were published.
pub async fn pump_lines<R>(reader: R, hub: &Hub, label: &str, stream: LogStream) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match log_from_bus_line(&line, label, stream, Utc::now()) {
                Ok(log) => {
                    hub.publish_log(log);
                    published += 1;
                }
                Err(e) => debug!(error = %e, "log line skipped"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "log bus read failed");
                break;
            }
        }
    }
    published
}

async fn run_once(hub: &Hub, cfg: &LogBusConfig, label: &str) -> Result<()> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&cfg.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(HubError::upstream)?;
    info!(event = "log_bus_started", command = %cfg.command, pid = ?child.id());

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| HubError::upstream("log bus stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| HubError::upstream("log bus stderr not captured"))?;
    let (out, err) = tokio::join!(
        pump_lines(BufReader::new(stdout), hub, label, LogStream::Out),
        pump_lines(BufReader::new(stderr), hub, label, LogStream::Err),
    );
    let status = child.wait().await?;
    Err(HubError::upstream(format!(
        "log bus exited with {status} after {} lines",
        out + err
    )))
}

pub fn spawn_log_bus(hub: Arc<Hub>, cfg: LogBusConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let label = cfg.label();
        loop {
            if let Err(e) = run_once(&hub, &cfg, &label).await {
                warn!(event = "log_bus_down", error = %e, retry_ms = cfg.retry.as_millis() as u64);
            }
            sleep(cfg.retry).await;
        }
    })
}
