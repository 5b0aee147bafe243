//! # Rate Limiter
//!
//! Fixed window request counter keyed by client address.
//!
//! ## Behavior
//!
//! - First request from a key, or any request once its window has ended, opens a new window with a count of 1
//! - While the window is open, requests are allowed until the count reaches the limit
//! - A denied request does not bump the count
//!
//! ## Memory
//!
//! Every distinct address leaves a record behind. Records whose window has ended carry no information,
//! so [`RateLimiter::evict_expired`] drops them. It runs from a background task on an interval and also
//! inline once the ledger grows past `max_keys`.
//!
//! The inline sweep is a full scan, so it is throttled. Past `max_keys` it only reruns after a full window
//! has gone by since the last sweep, or after the ledger has doubled since then. A flood of distinct live
//! clients therefore costs one scan per doubling instead of one per request.
//!
//! ## Concurrency
//!
//! The ledger is a `DashMap`. `entry` holds the shard lock for the whole read-modify-write, so two
//! requests from the same client can never both observe the last free slot.
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window: Duration,
    pub max_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            window: Duration::from_secs(60 * 60),
            max_keys: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    reset_at: Instant,
}

impl RateLimitRecord {
    /// The window is still open at its last instant, `reset_at` itself included.
    fn is_open(&self, now: Instant) -> bool {
        now <= self.reset_at
    }
}

/// When the last sweep ran and how many records it left behind.
#[derive(Debug, Clone, Copy)]
struct SweepMark {
    at: Instant,
    remaining: usize,
}

pub struct RateLimiter {
    records: DashMap<String, RateLimitRecord>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    last_sweep: Mutex<Option<SweepMark>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            config,
            clock,
            last_sweep: Mutex::new(None),
        }
    }

    /// Returns `true` when the request is allowed, consuming one slot of the window.
    pub fn check_and_consume(&self, client_key: &str) -> bool {
        let now = self.clock.now();

        if self.sweep_due(now) {
            self.evict_expired();
        }

        match self.records.entry(client_key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(self.fresh_window(now));
                true
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();

                if !record.is_open(now) {
                    *record = self.fresh_window(now);
                    return true;
                }

                if record.count >= self.config.limit {
                    return false;
                }

                record.count += 1;
                true
            }
        }
    }

    /// Drops every record whose window has ended. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.records.len();

        self.records.retain(|_, record| record.is_open(now));

        let remaining = self.records.len();
        *self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(SweepMark { at: now, remaining });

        let evicted = before.saturating_sub(remaining);
        if evicted > 0 {
            debug!("Evicted {evicted} expired rate limit records");
        }

        evicted
    }

    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    fn sweep_due(&self, now: Instant) -> bool {
        let tracked = self.records.len();
        if tracked < self.config.max_keys {
            return false;
        }

        let last = *self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);

        match last {
            None => true,
            Some(mark) => {
                now.saturating_duration_since(mark.at) >= self.config.window
                    || tracked >= mark.remaining.max(self.config.max_keys).saturating_mul(2)
            }
        }
    }

    fn fresh_window(&self, now: Instant) -> RateLimitRecord {
        RateLimitRecord {
            count: 1,
            reset_at: now + self.config.window,
        }
    }
}
