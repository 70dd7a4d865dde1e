//! Bounded feeds for what the viewer has shown.

use std::collections::VecDeque;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

// Most recent `cap` items, oldest first
#[derive(Debug, Clone)]
pub struct Feed<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> Feed<T> {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            items: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, v: T) {
        push_capped(&mut self.items, v, self.cap);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_keeps_latest_items() {
        let mut f = Feed::new(2);
        for v in 1..=5 {
            f.push(v);
        }
        assert_eq!(f.iter().copied().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(f.latest(), Some(&5));
    }
}
