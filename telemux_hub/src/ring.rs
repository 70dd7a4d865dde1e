//! Fixed-capacity FIFO history used for catch-up replay.
//!
//! Not synchronized on its own: the hub appends and snapshots inside its single
//! critical section, which keeps ring order and broadcast order identical.

use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
pub struct RingBuffer<T> {
    items: VecDeque<Arc<T>>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting (and returning) the oldest entry when full.
    pub fn append(&mut self, item: Arc<T>) -> Option<Arc<T>> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Current contents, oldest to newest.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
