//! # Count Cache
//!
//! Single slot memo for the displayed waitlist count. The count is a global scalar, so there is no key.
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    value: u64,
    expiry: Instant,
}

pub struct CountCache {
    slot: Mutex<Option<CachedCount>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CountCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
            clock,
        }
    }

    /// Cached value, only while strictly before its expiry.
    pub fn get(&self) -> Option<u64> {
        let now = self.clock.now();
        let cached = *self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        cached
            .filter(|cached| now < cached.expiry)
            .map(|cached| cached.value)
    }

    pub fn set(&self, value: u64) {
        let expiry = self.clock.now() + self.ttl;

        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(CachedCount { value, expiry });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const TTL: Duration = Duration::from_secs(5 * 60);

    #[test]
    fn empty_until_set() {
        let cache = CountCache::new(TTL, Arc::new(ManualClock::default()));

        assert_eq!(cache.get(), None);
        cache.set(0);
        assert_eq!(cache.get(), Some(0));
    }

    #[test]
    fn hit_is_strictly_before_expiry() {
        let clock = ManualClock::default();
        let cache = CountCache::new(TTL, Arc::new(clock.clone()));

        cache.set(1500);
        clock.advance(TTL - Duration::from_millis(1));
        assert_eq!(cache.get(), Some(1500));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn set_refreshes_expiry() {
        let clock = ManualClock::default();
        let cache = CountCache::new(TTL, Arc::new(clock.clone()));

        cache.set(100);
        clock.advance(TTL);
        cache.set(200);
        clock.advance(Duration::from_secs(60));

        assert_eq!(cache.get(), Some(200));
    }
}
