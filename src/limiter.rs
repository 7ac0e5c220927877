//! Token-bucket admission control.
//!
//! Buckets are keyed by `(agent, limit kind)` and refilled continuously at a
//! per-kind rate. The refill-then-consume step happens under the key's map
//! entry, so concurrent requests for the same agent never double-spend
//! tokens. The map is bounded: when it grows past its cap the least recently
//! used buckets are evicted.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

use crate::engine::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// Game actions submitted to a table.
    Action,
    /// Seat joins / table creation.
    Join,
    /// Everything else on the socket (pings, state requests).
    Message,
}

#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub capacity: u32,
    pub refill_per_sec: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    pub action: BucketConfig,
    pub join: BucketConfig,
    pub message: BucketConfig,
    /// Maximum number of live buckets before LRU eviction kicks in.
    pub max_buckets: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            action: BucketConfig {
                capacity: 10,
                refill_per_sec: 4.0,
            },
            join: BucketConfig {
                capacity: 5,
                refill_per_sec: 0.5,
            },
            message: BucketConfig {
                capacity: 30,
                refill_per_sec: 10.0,
            },
            max_buckets: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limit exceeded, retry after {retry_after:?}")]
pub struct RateLimited {
    /// Hint for the client: time until one token is available.
    pub retry_after: Duration,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_used: Instant,
}

pub struct RateLimiter {
    config: LimiterConfig,
    buckets: DashMap<(AgentId, LimitKind), Bucket>,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    fn bucket_config(&self, kind: LimitKind) -> BucketConfig {
        match kind {
            LimitKind::Action => self.config.action,
            LimitKind::Join => self.config.join,
            LimitKind::Message => self.config.message,
        }
    }

    /// Take one token for `(agent, kind)`, or report how long to wait.
    pub fn check(&self, agent: &str, kind: LimitKind) -> Result<(), RateLimited> {
        self.check_at(agent, kind, Instant::now())
    }

    fn check_at(&self, agent: &str, kind: LimitKind, now: Instant) -> Result<(), RateLimited> {
        let cfg = self.bucket_config(kind);
        let key = (agent.to_string(), kind);
        let mut entry = self.buckets.entry(key).or_insert_with(|| Bucket {
            tokens: cfg.capacity as f64,
            last_refill: now,
            last_used: now,
        });
        let bucket = entry.value_mut();

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * cfg.refill_per_sec).min(cfg.capacity as f64);
        bucket.last_refill = now;
        bucket.last_used = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            drop(entry);
            self.evict_if_over_cap();
            return Ok(());
        }
        let deficit = 1.0 - bucket.tokens;
        let retry_after = Duration::from_secs_f64(deficit / cfg.refill_per_sec);
        Err(RateLimited { retry_after })
    }

    /// Drop least-recently-used buckets once the map exceeds its cap.
    fn evict_if_over_cap(&self) {
        let cap = self.config.max_buckets;
        while self.buckets.len() > cap {
            let oldest = self
                .buckets
                .iter()
                .min_by_key(|entry| entry.value().last_used)
                .map(|entry| entry.key().clone());
            let Some(key) = oldest else { break };
            self.buckets.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(capacity: u32, refill_per_sec: f64, max_buckets: usize) -> RateLimiter {
        let bucket = BucketConfig {
            capacity,
            refill_per_sec,
        };
        RateLimiter::new(LimiterConfig {
            action: bucket,
            join: bucket,
            message: bucket,
            max_buckets,
        })
    }

    #[test]
    fn burst_up_to_capacity_then_limited() {
        let limiter = limiter(3, 1.0, 100);
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check_at("agent-a", LimitKind::Action, now).unwrap();
        }
        let err = limiter
            .check_at("agent-a", LimitKind::Action, now)
            .unwrap_err();
        assert!(err.retry_after > Duration::ZERO);
        assert!(err.retry_after <= Duration::from_secs(1));
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = limiter(1, 2.0, 100);
        let start = Instant::now();
        limiter.check_at("agent-a", LimitKind::Action, start).unwrap();
        assert!(limiter.check_at("agent-a", LimitKind::Action, start).is_err());
        let later = start + Duration::from_millis(600);
        limiter.check_at("agent-a", LimitKind::Action, later).unwrap();
    }

    #[test]
    fn kinds_and_agents_have_independent_buckets() {
        let limiter = limiter(1, 0.1, 100);
        let now = Instant::now();
        limiter.check_at("agent-a", LimitKind::Action, now).unwrap();
        limiter.check_at("agent-a", LimitKind::Join, now).unwrap();
        limiter.check_at("agent-b", LimitKind::Action, now).unwrap();
        assert!(limiter.check_at("agent-a", LimitKind::Action, now).is_err());
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let limiter = limiter(2, 10.0, 100);
        let start = Instant::now();
        limiter.check_at("agent-a", LimitKind::Action, start).unwrap();
        let much_later = start + Duration::from_secs(60);
        for _ in 0..2 {
            limiter
                .check_at("agent-a", LimitKind::Action, much_later)
                .unwrap();
        }
        assert!(limiter
            .check_at("agent-a", LimitKind::Action, much_later)
            .is_err());
    }

    #[test]
    fn old_buckets_are_evicted_at_the_cap() {
        let limiter = limiter(5, 1.0, 2);
        let start = Instant::now();
        limiter.check_at("agent-a", LimitKind::Action, start).unwrap();
        limiter
            .check_at("agent-b", LimitKind::Action, start + Duration::from_secs(1))
            .unwrap();
        limiter
            .check_at("agent-c", LimitKind::Action, start + Duration::from_secs(2))
            .unwrap();
        assert!(limiter.buckets.len() <= 2);
        assert!(!limiter
            .buckets
            .contains_key(&("agent-a".to_string(), LimitKind::Action)));
    }
}
