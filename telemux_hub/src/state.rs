//! Shared handler state.

use std::sync::Arc;
use std::time::Duration;

use crate::hub::Hub;
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    // None: history falls back to the in-memory record buffer
    pub store: Option<Arc<dyn RecordStore>>,
    pub history_page_size: usize,
    pub write_timeout: Duration,
}

impl AppState {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            hub,
            store: None,
            history_page_size: 50,
            write_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }
}
