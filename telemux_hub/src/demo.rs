//! Simulated action stream for running the hub without real producers.
//!
//! Records land in an in-memory store that the cursor poller reads; about half
//! are also pushed straight into the hub, so both paths deliver the same record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::adapters::record_from_event;
use crate::hub::Hub;
use crate::store::MemoryStore;

const USERS: [&str; 6] = ["Alice", "Bob", "Charlie", "David", "Eve", "Frank"];
const ACTIONS: [&str; 6] = ["login", "purchase", "view_item", "logout", "signup", "click_ad"];
const PAGES: [&str; 6] = ["/home", "/products", "/cart", "/checkout", "/profile", "/settings"];
const BROWSERS: [&str; 4] = ["Chrome", "Firefox", "Safari", "Edge"];
const OSES: [&str; 5] = ["Windows", "macOS", "Linux", "iOS", "Android"];

fn pick<R: Rng>(rng: &mut R, from: &[&'static str]) -> &'static str {
    from.choose(rng).copied().unwrap_or_default()
}

/// One simulated record envelope. The sequence number is the wall clock in
/// milliseconds followed by a six digit counter, so it grows with time.
pub fn simulated_record<R: Rng>(rng: &mut R, now: DateTime<Utc>, counter: u64) -> Value {
    let id: String = (0..8)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_uppercase())
        .collect();
    let at = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    json!({
        "id": id,
        "sequenceNumber": format!("{}{:06}", now.timestamp_millis(), counter % 1_000_000),
        "data": {
            "user": pick(rng, &USERS),
            "action": pick(rng, &ACTIONS),
            "page": pick(rng, &PAGES),
            "timestamp": at,
            "meta": {
                "browser": pick(rng, &BROWSERS),
                "os": pick(rng, &OSES),
            }
        },
        "approximateArrivalTimestamp": at,
    })
}

pub fn spawn_demo_producer(store: Arc<MemoryStore>, hub: Arc<Hub>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut counter = 0u64;
        loop {
            ticker.tick().await;
            counter += 1;
            let now = Utc::now();
            // ThreadRng is !Send; keep it out of the await points.
            let (raw, push) = {
                let mut rng = rand::thread_rng();
                (simulated_record(&mut rng, now, counter), rng.gen_bool(0.5))
            };
            store.insert(raw.clone());
            if push {
                match record_from_event(raw, now) {
                    Ok(record) => {
                        let admission = hub.publish_record(record);
                        debug!(event = "demo_push", ?admission);
                    }
                    Err(e) => warn!(error = %e, "demo record rejected"),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn simulated_records_pass_the_record_adapter() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();
        let a = record_from_event(simulated_record(&mut rng, now, 1), now).unwrap();
        let b = record_from_event(simulated_record(&mut rng, now, 2), now).unwrap();
        assert_ne!(a.sequence_number, b.sequence_number);
        assert_eq!(a.id.len(), 8);
        assert!(USERS.contains(&a.data.user.as_str()));
        assert!(ACTIONS.contains(&a.data.action.as_str()));
        assert!(crate::adapters::snapshot_from_raw_metrics(&a).is_none());
    }
}
