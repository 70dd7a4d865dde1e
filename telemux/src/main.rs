//! Entry point for the telemux viewer. Connects to a hub and prints its live feed.

use std::time::Duration;

use clap::Parser;
use telemux::types::ControlAction;
use telemux::viewer::FeedState;
use telemux::ws::{connect, next_event, send_action};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const FEED_CAP: usize = 500;

#[derive(Debug, Parser)]
#[command(name = "telemux", version, about = "Live viewer for a telemux hub")]
struct Args {
    /// Hub live-channel URL, e.g. ws://HOST:3001/ws
    url: String,

    /// CA certificate (PEM) to trust for wss:// URLs
    #[arg(short = 't', long = "tls-ca", value_name = "CERT_PEM")]
    tls_ca: Option<String>,

    /// Send one control action after connecting, as ACTION:NAME (e.g. restart:api)
    #[arg(long, value_name = "ACTION:NAME", value_parser = parse_action)]
    action: Option<ControlAction>,

    /// Print frames as received JSON instead of formatted lines
    #[arg(long)]
    raw: bool,

    /// Exit after printing this many events
    #[arg(long, value_name = "N")]
    max_events: Option<usize>,

    /// Reconnect after the connection drops
    #[arg(long)]
    reconnect: bool,
}

fn parse_action(s: &str) -> Result<ControlAction, String> {
    ControlAction::parse(s).ok_or_else(|| format!("expected ACTION:NAME, got {s:?}"))
}

enum SessionEnd {
    Limit,
    Closed,
}

async fn run_session(
    args: &Args,
    feed: &mut FeedState,
    printed: &mut usize,
    action: Option<&ControlAction>,
) -> anyhow::Result<SessionEnd> {
    let mut ws = connect(&args.url, args.tls_ca.as_deref()).await?;
    eprintln!("connected to {}", args.url);
    if let Some(a) = action {
        send_action(&mut ws, a).await?;
        eprintln!("sent {} for {}", a.action, a.name);
    }

    while let Some(next) = next_event(&mut ws).await {
        let (raw, ev) = match next {
            Ok(v) => v,
            Err(e) if e.downcast_ref::<serde_json::Error>().is_some() => {
                eprintln!("skipping frame: {e:#}");
                continue;
            }
            Err(e) => return Err(e),
        };
        if let Some(line) = feed.apply(ev) {
            if args.raw {
                println!("{raw}");
            } else {
                println!("{line}");
            }
            *printed += 1;
            if args.max_events.is_some_and(|max| *printed >= max) {
                return Ok(SessionEnd::Limit);
            }
        }
    }
    Ok(SessionEnd::Closed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut feed = FeedState::new(FEED_CAP);
    let mut printed = 0usize;
    // The action is a one-shot; reconnects do not resend it.
    let mut action = args.action.clone();

    loop {
        let session = tokio::select! {
            res = run_session(&args, &mut feed, &mut printed, action.as_ref()) => res,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        action = None;
        match session {
            Ok(SessionEnd::Limit) => return Ok(()),
            Ok(SessionEnd::Closed) => eprintln!("connection closed by hub"),
            Err(e) if args.reconnect => eprintln!("connection error: {e:#}"),
            Err(e) => return Err(e),
        }
        if !args.reconnect {
            return Ok(());
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
