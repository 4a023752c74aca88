//! Sliding-window per-IP click rate ceiling.
//!
//! Process-local only: each instance behind a load balancer enforces its own
//! ceiling. Replacing this with a networked KV (shared atomic counters + TTL)
//! preserves the same `allow` contract.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Sliding-window limiter keyed by hashed IP. Each key's timestamp vector is
/// guarded by the `DashMap` shard lock — no single global lock to contend on.
pub struct ClickRateLimiter {
    history: DashMap<String, Vec<DateTime<Utc>>>,
    window: Duration,
}

impl ClickRateLimiter {
    pub fn new() -> Self {
        Self {
            history: DashMap::new(),
            window: Duration::seconds(60),
        }
    }

    /// Drop timestamps older than `now - window`; if the remaining count is
    /// already at `limit`, refuse. Otherwise record `now` and allow.
    pub fn allow(&self, ip_hash: &str, now: DateTime<Utc>, limit: u32) -> bool {
        let mut entry = self.history.entry(ip_hash.to_string()).or_default();
        let cutoff = now - self.window;
        entry.retain(|ts| *ts >= cutoff);

        if entry.len() as u32 >= limit {
            return false;
        }
        entry.push(now);
        true
    }
}

impl Default for ClickRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
