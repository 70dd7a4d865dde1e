//! Command-line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::error::HubError;
use crate::hub::HubConfig;
use crate::logbus::LogBusConfig;
use crate::poller::PollerConfig;
use crate::reconciler::Thresholds;

#[derive(Debug, Clone, Parser)]
#[command(name = "telemux_hub", version, about = "Telemetry ingest, reconcile and broadcast hub")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TELEMUX_PORT", default_value_t = 3001)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "TELEMUX_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Store poll interval in milliseconds
    #[arg(long, env = "TELEMUX_POLL_INTERVAL_MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// Record store endpoint; the poller is disabled without it
    #[arg(long, env = "TELEMUX_STORE_URL")]
    pub store_url: Option<String>,

    /// Records requested from the store per poll
    #[arg(long, env = "TELEMUX_STORE_PAGE_SIZE", default_value_t = 10)]
    pub store_page_size: usize,

    #[arg(long, env = "TELEMUX_STORE_TIMEOUT_MS", default_value_t = 3000)]
    pub store_timeout_ms: u64,

    /// Records returned by the history endpoint
    #[arg(long, env = "TELEMUX_HISTORY_PAGE_SIZE", default_value_t = 50)]
    pub history_page_size: usize,

    #[arg(long, env = "TELEMUX_RECORD_CAPACITY", default_value_t = 100)]
    pub record_capacity: usize,

    #[arg(long, env = "TELEMUX_LOG_CAPACITY", default_value_t = 200)]
    pub log_capacity: usize,

    #[arg(long, env = "TELEMUX_ALERT_CAPACITY", default_value_t = 50)]
    pub alert_capacity: usize,

    /// Live items a viewer may have pending before the oldest cheap ones are shed
    #[arg(long, env = "TELEMUX_VIEWER_QUEUE", default_value_t = 256)]
    pub viewer_queue: usize,

    /// Sequence numbers remembered for de-duplication
    #[arg(long, env = "TELEMUX_DEDUP_CAPACITY", default_value_t = 10_000)]
    pub dedup_capacity: usize,

    /// Disk usage percent that raises a low disk warning
    #[arg(long, env = "TELEMUX_DISK_THRESHOLD", default_value_t = 85.0)]
    pub disk_threshold: f64,

    /// Memory usage percent that raises RAM Critical
    #[arg(long, env = "TELEMUX_MEMORY_CRITICAL", default_value_t = 90.0)]
    pub memory_critical: f64,

    /// Memory must drop below this before RAM Critical can fire again
    #[arg(long, env = "TELEMUX_MEMORY_REARM", default_value_t = 85.0)]
    pub memory_rearm: f64,

    /// Raise an alert for every log line on the error stream
    #[arg(long, env = "TELEMUX_STDERR_ALERTS", default_value_t = true, action = ArgAction::Set)]
    pub stderr_alerts: bool,

    /// Shell command whose output is tailed as the log bus (e.g. "pm2 logs --json")
    #[arg(long, env = "TELEMUX_LOG_COMMAND")]
    pub log_command: Option<String>,

    #[arg(long, env = "TELEMUX_LOG_RETRY_MS", default_value_t = 5000)]
    pub log_retry_ms: u64,

    /// A viewer whose socket write stalls this long is disconnected
    #[arg(long, env = "TELEMUX_WRITE_TIMEOUT_MS", default_value_t = 5000)]
    pub write_timeout_ms: u64,

    /// Run an in-memory store with a simulated action stream
    #[arg(long, env = "TELEMUX_DEMO")]
    pub demo: bool,

    /// Serve over TLS with a self-signed certificate
    #[arg(long = "enable-ssl", alias = "enableSSL", env = "TELEMUX_ENABLE_SSL")]
    pub enable_ssl: bool,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: SocketAddr,
    pub hub: HubConfig,
    pub poller: PollerConfig,
    pub store_url: Option<String>,
    pub store_timeout: Duration,
    pub history_page_size: usize,
    pub log_bus: Option<LogBusConfig>,
    pub write_timeout: Duration,
    pub demo: bool,
    pub enable_ssl: bool,
}

fn positive(name: &str, v: u64) -> Result<(), HubError> {
    if v == 0 {
        return Err(HubError::Config(format!("{name} must be greater than zero")));
    }
    Ok(())
}

fn percent(name: &str, v: f64) -> Result<(), HubError> {
    if !(0.0..=100.0).contains(&v) {
        return Err(HubError::Config(format!("{name} must be within 0..=100, got {v}")));
    }
    Ok(())
}

impl Args {
    pub fn into_settings(self) -> Result<Settings, HubError> {
        for (name, v) in [
            ("poll-interval-ms", self.poll_interval_ms),
            ("store-page-size", self.store_page_size as u64),
            ("store-timeout-ms", self.store_timeout_ms),
            ("history-page-size", self.history_page_size as u64),
            ("record-capacity", self.record_capacity as u64),
            ("log-capacity", self.log_capacity as u64),
            ("alert-capacity", self.alert_capacity as u64),
            ("viewer-queue", self.viewer_queue as u64),
            ("dedup-capacity", self.dedup_capacity as u64),
            ("log-retry-ms", self.log_retry_ms),
            ("write-timeout-ms", self.write_timeout_ms),
        ] {
            positive(name, v)?;
        }
        percent("disk-threshold", self.disk_threshold)?;
        percent("memory-critical", self.memory_critical)?;
        percent("memory-rearm", self.memory_rearm)?;
        if self.memory_rearm > self.memory_critical {
            return Err(HubError::Config(format!(
                "memory-rearm ({}) must not exceed memory-critical ({})",
                self.memory_rearm, self.memory_critical
            )));
        }

        let log_bus = self
            .log_command
            .filter(|c| !c.trim().is_empty())
            .map(|command| LogBusConfig {
                command,
                retry: Duration::from_millis(self.log_retry_ms),
            });

        Ok(Settings {
            addr: SocketAddr::new(self.bind, self.port),
            hub: HubConfig {
                record_capacity: self.record_capacity,
                log_capacity: self.log_capacity,
                alert_capacity: self.alert_capacity,
                viewer_queue: self.viewer_queue,
                dedup_capacity: self.dedup_capacity,
                thresholds: Thresholds {
                    disk_warn_pct: self.disk_threshold,
                    memory_critical_pct: self.memory_critical,
                    memory_rearm_pct: self.memory_rearm,
                },
                stderr_alerts: self.stderr_alerts,
            },
            poller: PollerConfig {
                interval: Duration::from_millis(self.poll_interval_ms),
                page_size: self.store_page_size,
            },
            store_url: self.store_url.filter(|u| !u.trim().is_empty()),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            history_page_size: self.history_page_size,
            log_bus,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            demo: self.demo,
            enable_ssl: self.enable_ssl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("telemux_hub").chain(args.iter().copied()))
            .expect("args parse")
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = parse(&[]).into_settings().unwrap();
        assert_eq!(s.addr.port(), 3001);
        assert_eq!(s.poller.interval, Duration::from_secs(2));
        assert_eq!(s.poller.page_size, 10);
        assert_eq!(s.history_page_size, 50);
        assert_eq!(s.hub.thresholds, Thresholds::default());
        assert!(s.hub.stderr_alerts);
        assert!(s.store_url.is_none() && s.log_bus.is_none());
    }

    #[test]
    fn port_short_long_and_ssl_alias() {
        assert_eq!(parse(&["-p", "9002"]).port, 9002);
        assert_eq!(parse(&["--port=9003"]).port, 9003);
        assert!(parse(&["--enableSSL"]).enable_ssl);
        assert!(parse(&["--enable-ssl"]).enable_ssl);
        assert!(!parse(&["--stderr-alerts", "false"]).stderr_alerts);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["--record-capacity", "0"]).into_settings().is_err());
        assert!(parse(&["--disk-threshold", "120"]).into_settings().is_err());
        assert!(parse(&["--memory-rearm", "95"]).into_settings().is_err());
        assert!(Args::try_parse_from(["telemux_hub", "--port", "notaport"]).is_err());
    }
}
