//! External record store, treated as a black box queried for its most recent items.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{HubError, Result};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Up to `limit` of the most recent raw items, in whatever order the store returns.
    async fn recent(&self, limit: usize) -> Result<Vec<Value>>;
}

/// Store reachable over HTTP: `GET <url>?limit=N` returning a JSON array, or an
/// object wrapping one under `Items`, `items` or `records`.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    url: String,
}

impl HttpStore {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HubError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

fn items_from_body(body: Value, limit: usize) -> Result<Vec<Value>> {
    let mut items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match ["Items", "items", "records"]
            .iter()
            .find_map(|k| obj.remove(*k))
        {
            Some(Value::Array(items)) => items,
            _ => return Err(HubError::upstream("store response has no item list")),
        },
        _ => return Err(HubError::upstream("store response is not a list")),
    };
    items.truncate(limit);
    Ok(items)
}

#[async_trait]
impl RecordStore for HttpStore {
    async fn recent(&self, limit: usize) -> Result<Vec<Value>> {
        let body: Value = self
            .client
            .get(&self.url)
            .query(&[("limit", limit)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(HubError::upstream)?
            .json()
            .await
            .map_err(HubError::upstream)?;
        items_from_body(body, limit)
    }
}

/// In-process store used by demo mode and tests. Returns newest first.
#[derive(Debug)]
pub struct MemoryStore {
    items: Mutex<Vec<Value>>,
    available: AtomicBool,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, item: Value) {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.push(item);
        if items.len() > self.capacity {
            let excess = items.len() - self.capacity;
            items.drain(..excess);
        }
    }

    /// Simulate an outage: `recent` fails while unavailable.
    pub fn set_available(&self, up: bool) {
        self.available.store(up, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn recent(&self, limit: usize) -> Result<Vec<Value>> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(HubError::upstream("memory store marked unavailable"));
        }
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_shapes() {
        let arr = items_from_body(json!([1, 2, 3]), 2).unwrap();
        assert_eq!(arr, vec![json!(1), json!(2)]);
        let wrapped = items_from_body(json!({"Items": [{"a": 1}], "Count": 1}), 10).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert!(matches!(
            items_from_body(json!({"nope": true}), 10),
            Err(HubError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn memory_store_is_newest_first_and_can_fail() {
        let store = MemoryStore::new(3);
        for i in 0..5 {
            store.insert(json!({ "n": i }));
        }
        assert_eq!(store.len(), 3);
        let got = store.recent(2).await.unwrap();
        assert_eq!(got, vec![json!({"n": 4}), json!({"n": 3})]);

        store.set_available(false);
        assert!(store.recent(2).await.is_err());
    }
}
