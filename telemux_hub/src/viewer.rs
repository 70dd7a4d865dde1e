//! Per-connection delivery queue.
//!
//! The hub enqueues from inside its critical section, so `push` must never wait
//! on the network: it only touches this queue's own short-lived lock and wakes
//! the connection's writer task.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::event::{DropClass, HubEvent, Outbound, ReplaySummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    Connecting,
    Replaying,
    Live,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// An older queued snapshot was replaced by this one.
    Collapsed,
    /// The queue was full; an item of this class was shed.
    Dropped(DropClass),
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropStats {
    pub logs: u64,
    pub records: u64,
    pub alerts: u64,
    pub snapshots: u64,
}

impl DropStats {
    fn count(&mut self, class: DropClass) {
        match class {
            DropClass::Log => self.logs += 1,
            DropClass::Record => self.records += 1,
            DropClass::Alert => self.alerts += 1,
            DropClass::Snapshot => self.snapshots += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.logs + self.records + self.alerts + self.snapshots
    }
}

#[derive(Debug)]
struct QueueState {
    phase: ViewerPhase,
    replay: VecDeque<HubEvent>,
    summary: ReplaySummary,
    live: VecDeque<HubEvent>,
    dropped: DropStats,
}

#[derive(Debug)]
pub struct ViewerQueue {
    id: u64,
    bound: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl ViewerQueue {
    pub fn new(id: u64, bound: usize) -> Self {
        Self {
            id,
            bound: bound.max(1),
            state: Mutex::new(QueueState {
                phase: ViewerPhase::Connecting,
                replay: VecDeque::new(),
                summary: ReplaySummary::default(),
                live: VecDeque::new(),
                dropped: DropStats::default(),
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Load the catch-up batch. Everything pushed afterwards waits behind it.
    /// Neither the replay nor what queues behind it is subject to the live bound
    /// until the replay has drained.
    pub fn begin_replay(&self, items: Vec<HubEvent>, summary: ReplaySummary) {
        let mut st = self.lock();
        if st.phase != ViewerPhase::Connecting {
            return;
        }
        st.replay = items.into();
        st.summary = summary;
        st.phase = ViewerPhase::Replaying;
        drop(st);
        self.notify.notify_one();
    }

    pub fn push(&self, ev: HubEvent) -> PushOutcome {
        let mut st = self.lock();
        if st.phase == ViewerPhase::Closed {
            return PushOutcome::Closed;
        }
        let incoming = ev.class();
        let queued_snapshot = if incoming == DropClass::Snapshot {
            st.live.iter().position(|q| q.class() == DropClass::Snapshot)
        } else {
            None
        };
        let bounded = st.phase == ViewerPhase::Live;
        let outcome = if st.live.len() < self.bound {
            st.live.push_back(ev);
            PushOutcome::Queued
        } else if !bounded && queued_snapshot.is_none() {
            // Still replaying: live items wait behind the replay, none are shed.
            st.live.push_back(ev);
            PushOutcome::Queued
        } else if let Some(pos) = queued_snapshot {
            // Latest-wins: the stale snapshot leaves, the fresh one queues in arrival order.
            st.live.remove(pos);
            st.live.push_back(ev);
            st.dropped.count(DropClass::Snapshot);
            PushOutcome::Collapsed
        } else {
            // Oldest item of the lowest class present.
            let victim = st
                .live
                .iter()
                .enumerate()
                .min_by_key(|(idx, q)| (q.class(), *idx))
                .map(|(idx, q)| (idx, q.class()));
            match victim {
                Some((idx, class)) if class <= incoming => {
                    st.live.remove(idx);
                    st.live.push_back(ev);
                    st.dropped.count(class);
                    PushOutcome::Dropped(class)
                }
                _ => {
                    st.dropped.count(incoming);
                    PushOutcome::Dropped(incoming)
                }
            }
        };
        drop(st);
        self.notify.notify_one();
        outcome
    }

    /// Take the next item, if one is ready. Emits the replay-complete marker
    /// exactly once, when the replay batch has drained.
    pub fn try_next(&self) -> Option<Outbound> {
        let mut st = self.lock();
        match st.phase {
            ViewerPhase::Connecting | ViewerPhase::Closed => None,
            ViewerPhase::Replaying => match st.replay.pop_front() {
                Some(ev) => Some(Outbound::Event(ev)),
                None => {
                    st.phase = ViewerPhase::Live;
                    Some(Outbound::ReplayComplete(st.summary))
                }
            },
            ViewerPhase::Live => st.live.pop_front().map(Outbound::Event),
        }
    }

    /// Wait for the next item. `None` once the queue is closed.
    pub async fn next(&self) -> Option<Outbound> {
        loop {
            let notified = self.notify.notified();
            if self.phase() == ViewerPhase::Closed {
                return None;
            }
            if let Some(item) = self.try_next() {
                return Some(item);
            }
            notified.await;
        }
    }

    /// Terminal. Releases queued items right away; safe to call repeatedly.
    pub fn close(&self) {
        let mut st = self.lock();
        if st.phase == ViewerPhase::Closed {
            return;
        }
        st.phase = ViewerPhase::Closed;
        st.replay = VecDeque::new();
        st.live = VecDeque::new();
        drop(st);
        // notify_one stores a permit, so a writer not yet parked still wakes.
        self.notify.notify_one();
    }

    pub fn phase(&self) -> ViewerPhase {
        self.lock().phase
    }

    pub fn dropped(&self) -> DropStats {
        self.lock().dropped
    }

    /// Items waiting, replay and live together.
    pub fn pending(&self) -> usize {
        let st = self.lock();
        st.replay.len() + st.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogLine, LogOrigin, LogStream, StateSnapshot};
    use chrono::Utc;
    use std::sync::Arc;

    fn log(n: usize) -> HubEvent {
        HubEvent::Log(Arc::new(LogLine {
            process_name: "api".into(),
            text: format!("line {n}"),
            stream: LogStream::Out,
            timestamp: Utc::now(),
            origin: LogOrigin::ProcessBus,
        }))
    }

    fn snap(ts: &str) -> HubEvent {
        HubEvent::Snapshot(Arc::new(StateSnapshot {
            timestamp: Some(ts.into()),
            ..StateSnapshot::default()
        }))
    }

    // A queue past its (empty) replay, so the live bound applies.
    fn live_queue(id: u64, bound: usize) -> ViewerQueue {
        let q = ViewerQueue::new(id, bound);
        q.begin_replay(Vec::new(), ReplaySummary::default());
        assert!(matches!(q.try_next(), Some(Outbound::ReplayComplete(_))));
        q
    }

    fn live(q: &ViewerQueue) -> Vec<HubEvent> {
        let mut out = Vec::new();
        while let Some(item) = q.try_next() {
            if let Outbound::Event(ev) = item {
                out.push(ev);
            }
        }
        out
    }

    #[test]
    fn full_queue_sheds_logs_before_snapshots() {
        let q = live_queue(1, 2);
        assert_eq!(q.push(log(1)), PushOutcome::Queued);
        assert_eq!(q.push(log(2)), PushOutcome::Queued);
        assert_eq!(q.push(snap("a")), PushOutcome::Dropped(DropClass::Log));
        assert_eq!(q.push(snap("b")), PushOutcome::Collapsed);
        assert_eq!(q.push(log(3)), PushOutcome::Dropped(DropClass::Log));

        let items = live(&q);
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], HubEvent::Snapshot(s) if s.timestamp.as_deref() == Some("b")));
        assert!(matches!(&items[1], HubEvent::Log(l) if l.text == "line 3"));
        assert_eq!(q.dropped().logs, 2);
        assert_eq!(q.dropped().snapshots, 1);
    }

    #[test]
    fn replay_precedes_live_and_ends_with_marker() {
        let q = ViewerQueue::new(7, 4);
        let summary = ReplaySummary {
            snapshot: true,
            ..ReplaySummary::default()
        };
        q.begin_replay(vec![snap("replayed")], summary);
        q.push(log(1));

        assert!(matches!(q.try_next(), Some(Outbound::Event(HubEvent::Snapshot(_)))));
        assert!(matches!(q.try_next(), Some(Outbound::ReplayComplete(s)) if s.snapshot));
        assert_eq!(q.phase(), ViewerPhase::Live);
        assert!(matches!(q.try_next(), Some(Outbound::Event(HubEvent::Log(_)))));
        assert!(q.try_next().is_none());
    }

    #[test]
    fn nothing_is_shed_while_replaying() {
        let q = ViewerQueue::new(5, 2);
        q.begin_replay(vec![log(0)], ReplaySummary::default());
        for n in 1..=5 {
            assert_eq!(q.push(log(n)), PushOutcome::Queued);
        }
        assert_eq!(q.push(snap("a")), PushOutcome::Queued);
        assert_eq!(q.push(snap("b")), PushOutcome::Collapsed);
        assert_eq!(q.dropped().logs, 0);

        assert!(matches!(q.try_next(), Some(Outbound::Event(HubEvent::Log(_)))));
        assert!(matches!(q.try_next(), Some(Outbound::ReplayComplete(_))));
        let items = live(&q);
        assert_eq!(items.len(), 6);
        assert!(matches!(&items[4], HubEvent::Log(l) if l.text == "line 5"));
        assert!(matches!(&items[5], HubEvent::Snapshot(s) if s.timestamp.as_deref() == Some("b")));

        // Live now: the bound applies again.
        assert_eq!(q.push(log(6)), PushOutcome::Queued);
        assert_eq!(q.push(log(7)), PushOutcome::Queued);
        assert_eq!(q.push(log(8)), PushOutcome::Dropped(DropClass::Log));
    }

    #[test]
    fn close_is_idempotent_and_releases_items() {
        let q = ViewerQueue::new(3, 8);
        q.begin_replay(vec![log(0)], ReplaySummary::default());
        q.push(log(1));
        q.close();
        q.close();
        assert_eq!(q.phase(), ViewerPhase::Closed);
        assert_eq!(q.pending(), 0);
        assert_eq!(q.push(log(2)), PushOutcome::Closed);
        assert!(q.try_next().is_none());
    }

    #[tokio::test]
    async fn next_wakes_on_push_and_on_close() {
        let q = Arc::new(ViewerQueue::new(9, 4));
        q.begin_replay(Vec::new(), ReplaySummary::default());
        assert!(matches!(q.next().await, Some(Outbound::ReplayComplete(_))));

        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.next().await.is_some() })
        };
        q.push(log(1));
        assert!(waiter.await.unwrap());

        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.next().await.is_none() })
        };
        q.close();
        assert!(waiter.await.unwrap());
    }
}
