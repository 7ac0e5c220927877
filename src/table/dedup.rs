use std::collections::{HashMap, VecDeque};

/// Bounded request-id cache backing idempotent action processing.
///
/// A retransmitted request (same id, same fingerprint) replays the stored
/// reply without reapplying the action. The same id arriving with a different
/// fingerprint is a client bug and is surfaced as a conflict, never merged.
/// At capacity the oldest entry is evicted first.
#[derive(Debug)]
pub struct DedupCache<T> {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, (u64, T)>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DedupHit<'a, T> {
    Replay(&'a T),
    Conflict,
}

impl<T> DedupCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    pub fn check(&self, request_id: &str, fingerprint: u64) -> Option<DedupHit<'_, T>> {
        let (stored_fp, value) = self.entries.get(request_id)?;
        if *stored_fp == fingerprint {
            Some(DedupHit::Replay(value))
        } else {
            Some(DedupHit::Conflict)
        }
    }

    pub fn insert(&mut self, request_id: String, fingerprint: u64, value: T) {
        if self.entries.contains_key(&request_id) {
            return; // first result wins; replays never overwrite
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(request_id.clone());
        self.entries.insert(request_id, (fingerprint, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
