//! WebSocket client for the hub's live channel.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{bail, Context};
use futures_util::{SinkExt, StreamExt};
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, connect_async_tls_with_config, tungstenite::Message, Connector, MaybeTlsStream,
    WebSocketStream,
};
use url::Url;

use crate::types::{ControlAction, ViewerEvent};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Trust only the given CA (the hub's self-signed certificate)
fn tls_connector(ca_path: &str) -> anyhow::Result<Connector> {
    let file = File::open(ca_path).with_context(|| format!("opening CA {ca_path}"))?;
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
        roots
            .add(cert.with_context(|| format!("reading CA {ca_path}"))?)
            .context("adding CA certificate")?;
    }
    if roots.is_empty() {
        bail!("no certificates found in {ca_path}");
    }
    let cfg = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(Connector::Rustls(Arc::new(cfg)))
}

// Connect to the hub and return the WS stream
pub async fn connect(url: &str, tls_ca: Option<&str>) -> anyhow::Result<WsStream> {
    let parsed = Url::parse(url).with_context(|| format!("invalid URL {url}"))?;
    let ws = match (parsed.scheme(), tls_ca) {
        ("ws", _) => connect_async(url).await?.0,
        ("wss", Some(ca)) => {
            let connector = tls_connector(ca)?;
            connect_async_tls_with_config(url, None, false, Some(connector))
                .await?
                .0
        }
        ("wss", None) => bail!("wss:// needs --tls-ca pointing at the hub certificate"),
        (other, _) => bail!("unsupported scheme {other}:// (expected ws or wss)"),
    };
    Ok(ws)
}

pub async fn send_action(ws: &mut WsStream, action: &ControlAction) -> anyhow::Result<()> {
    ws.send(Message::Text(action.to_frame())).await?;
    Ok(())
}

/// Next text frame, raw and decoded. `None` when the hub closes the socket.
pub async fn next_event(ws: &mut WsStream) -> Option<anyhow::Result<(String, ViewerEvent)>> {
    loop {
        match ws.next().await? {
            Ok(Message::Text(text)) => {
                let decoded = ViewerEvent::decode(&text).context("decoding frame");
                return Some(decoded.map(|ev| (text, ev)));
            }
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => return Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unsupported_urls() {
        assert!(connect("http://127.0.0.1:1/ws", None).await.is_err());
        assert!(connect("wss://127.0.0.1:1/ws", None).await.is_err());
        assert!(connect("not a url", None).await.is_err());
    }
}
