//! Per-hand event history.
//!
//! The store is append-only and idempotent by event `seq`: replaying a batch
//! that was already persisted is a no-op, while a seq that arrives twice with
//! different content is surfaced as a conflict instead of being merged.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use crate::engine::{GameEvent, HandId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("hand {hand_id} already has a different event at seq {seq}")]
    SeqConflict { hand_id: HandId, seq: u64 },
    #[error("event batch for hand {0} is not contiguous")]
    NonContiguousBatch(HandId),
}

/// Storage surface for finished and in-progress hand records.
pub trait HandHistoryStore: Send + Sync {
    /// Append events for a hand, idempotently by `seq`.
    fn append_events(&self, hand_id: HandId, events: &[GameEvent]) -> Result<(), HistoryError>;

    /// All events recorded for a hand, in seq order.
    fn events(&self, hand_id: HandId) -> Vec<GameEvent>;

    /// Hands in first-seen order.
    fn list_hands(&self) -> Vec<HandId>;
}

#[derive(Default)]
struct HistoryInner {
    order: Vec<HandId>,
    hands: HashMap<HandId, Vec<GameEvent>>,
}

/// In-memory implementation backing single-process deployments and tests.
#[derive(Default)]
pub struct InMemoryHandHistory {
    inner: RwLock<HistoryInner>,
}

impl InMemoryHandHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandHistoryStore for InMemoryHandHistory {
    fn append_events(&self, hand_id: HandId, events: &[GameEvent]) -> Result<(), HistoryError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write();
        if !inner.hands.contains_key(&hand_id) {
            inner.order.push(hand_id);
        }
        let stored = inner.hands.entry(hand_id).or_default();
        for event in events {
            let idx = (event.seq as usize).checked_sub(1).ok_or(
                HistoryError::SeqConflict {
                    hand_id,
                    seq: event.seq,
                },
            )?;
            if let Some(existing) = stored.get(idx) {
                if existing != event {
                    return Err(HistoryError::SeqConflict {
                        hand_id,
                        seq: event.seq,
                    });
                }
                continue; // replay of an already-persisted event
            }
            if idx != stored.len() {
                return Err(HistoryError::NonContiguousBatch(hand_id));
            }
            stored.push(event.clone());
        }
        Ok(())
    }

    fn events(&self, hand_id: HandId) -> Vec<GameEvent> {
        let inner = self.inner.read();
        inner.hands.get(&hand_id).cloned().unwrap_or_default()
    }

    fn list_hands(&self) -> Vec<HandId> {
        let inner = self.inner.read();
        inner.order.clone()
    }
}
