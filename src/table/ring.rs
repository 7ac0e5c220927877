use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::engine::GameEvent;

/// A hand event stamped with the table-scoped event id. Ids are monotonic
/// across hands, so reconnecting clients can resume from a single cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: u64,
    pub event: GameEvent,
}

/// Bounded cache of the most recent table events, enabling
/// reconnect-and-resume without a full replay.
#[derive(Debug)]
pub struct EventRing {
    capacity: usize,
    next_id: u64,
    buffer: VecDeque<StoredEvent>,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: 1,
            buffer: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, event: GameEvent) -> StoredEvent {
        let stored = StoredEvent {
            event_id: self.next_id,
            event,
        };
        self.next_id += 1;
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(stored.clone());
        stored
    }

    /// Id of the newest stored event, 0 before anything was pushed.
    pub fn latest_id(&self) -> u64 {
        self.next_id - 1
    }

    /// The delta after `last_seen`, or `None` when `last_seen` predates the
    /// retained window and the caller needs a full snapshot instead.
    pub fn events_since(&self, last_seen: u64) -> Option<Vec<StoredEvent>> {
        let oldest = self
            .buffer
            .front()
            .map(|stored| stored.event_id)
            .unwrap_or(self.next_id);
        if last_seen.saturating_add(1) < oldest {
            return None;
        }
        Some(
            self.buffer
                .iter()
                .filter(|stored| stored.event_id > last_seen)
                .cloned()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GameEventKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(seq: u64) -> GameEvent {
        GameEvent {
            seq,
            hand_id: Uuid::nil(),
            timestamp: Utc::now(),
            kind: GameEventKind::Showdown { community: vec![] },
        }
    }

    #[test]
    fn event_ids_are_monotonic_across_pushes() {
        let mut ring = EventRing::new(8);
        assert_eq!(ring.push(event(1)).event_id, 1);
        assert_eq!(ring.push(event(2)).event_id, 2);
        assert_eq!(ring.latest_id(), 2);
    }

    #[test]
    fn delta_is_exactly_the_events_after_the_cursor() {
        let mut ring = EventRing::new(8);
        for i in 1..=5 {
            ring.push(event(i));
        }
        let delta = ring.events_since(3).unwrap();
        let ids: Vec<u64> = delta.iter().map(|s| s.event_id).collect();
        assert_eq!(ids, vec![4, 5]);
        assert!(ring.events_since(5).unwrap().is_empty());
    }

    #[test]
    fn cursor_before_the_window_requires_a_snapshot() {
        let mut ring = EventRing::new(3);
        for i in 1..=5 {
            ring.push(event(i));
        }
        // retained window is ids 3..=5
        assert!(ring.events_since(1).is_none());
        assert_eq!(ring.events_since(2).unwrap().len(), 3);
    }

    #[test]
    fn empty_ring_serves_a_fresh_cursor() {
        let ring = EventRing::new(3);
        assert_eq!(ring.events_since(0), Some(vec![]));
    }
}
