//! telemux_hub: ingests agent pushes, store polls and log-bus lines, and fans them
//! out to live viewers over WebSocket.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use telemux_hub::config::Args;
use telemux_hub::demo::spawn_demo_producer;
use telemux_hub::logbus::spawn_log_bus;
use telemux_hub::poller::{spawn_poller, CursorPoller};
use telemux_hub::routes::router;
use telemux_hub::state::AppState;
use telemux_hub::store::{HttpStore, MemoryStore, RecordStore};
use telemux_hub::{tls, Hub};

const DEMO_PERIOD: Duration = Duration::from_secs(5);

fn init_tracing() {
    // RUST_LOG wins; TELEMUX_LOG is the short form.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("TELEMUX_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = Args::parse().into_settings()?;
    let hub = Arc::new(Hub::new(settings.hub.clone()));

    let store: Option<Arc<dyn RecordStore>> = if settings.demo {
        let mem = Arc::new(MemoryStore::default());
        spawn_demo_producer(Arc::clone(&mem), Arc::clone(&hub), DEMO_PERIOD);
        info!("demo mode: simulated records every {}s", DEMO_PERIOD.as_secs());
        Some(mem as Arc<dyn RecordStore>)
    } else {
        match settings.store_url.as_deref() {
            Some(url) => {
                let http = HttpStore::new(url, settings.store_timeout)?;
                info!(store = url, "polling record store");
                Some(Arc::new(http) as Arc<dyn RecordStore>)
            }
            None => None,
        }
    };
    if let Some(store) = &store {
        spawn_poller(CursorPoller::new(
            Arc::clone(store),
            Arc::clone(&hub),
            settings.poller,
        ));
    } else {
        info!("no store configured; history is served from memory");
    }
    if let Some(cfg) = settings.log_bus.clone() {
        spawn_log_bus(Arc::clone(&hub), cfg);
    }

    let mut state = AppState::new(Arc::clone(&hub));
    state.store = store;
    state.history_page_size = settings.history_page_size;
    state.write_timeout = settings.write_timeout;
    let app = router(state);

    if settings.enable_ssl {
        let (cert, key) = tls::ensure_self_signed_cert()?;
        // More than one rustls provider is compiled in; pin the one the viewer uses.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let cfg = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert, &key)
            .await
            .context("loading TLS certificate")?;
        info!("telemux_hub listening on https://{} (wss)", settings.addr);
        axum_server::bind_rustls(settings.addr, cfg)
            .serve(app.into_make_service())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(settings.addr)
        .await
        .with_context(|| format!("binding {}", settings.addr))?;
    info!("telemux_hub listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
