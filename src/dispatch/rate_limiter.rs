//! Per-class token buckets pacing dispatch work, independent of whatever
//! limits the transport enforces on its side.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::sleep;
use tokio::time::Instant;

use crate::DispatchConfig;

/// Rate classes observed by the dispatcher: individual member sends and
/// whole broadcast runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    Individual,
    Broadcast,
}

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(
        capacity: f64,
        refill_per_sec: f64,
    ) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(
        &mut self,
        now: Instant,
    ) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes one token, or reports how long until one is available. The
    /// wait is floored at 1ms so float rounding can never produce a
    /// zero-length sleep loop.
    fn try_take(
        &mut self,
        now: Instant,
    ) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - self.tokens;
            Some(Duration::from_secs_f64(
                (missing / self.refill_per_sec).max(0.001),
            ))
        }
    }
}

pub struct CategoryRateLimiter {
    buckets: DashMap<RateClass, TokenBucket>,
}

impl CategoryRateLimiter {
    pub fn new(config: &DispatchConfig) -> Self {
        let buckets = DashMap::new();
        buckets.insert(
            RateClass::Individual,
            TokenBucket::new(
                config.individual_rate_per_sec as f64,
                config.individual_rate_per_sec as f64,
            ),
        );
        buckets.insert(
            RateClass::Broadcast,
            TokenBucket::new(1.0, config.broadcast_rate_per_min as f64 / 60.0),
        );
        Self { buckets }
    }

    /// Waits until the class has a token available.
    pub async fn acquire(
        &self,
        class: RateClass,
    ) {
        loop {
            // Never hold the shard lock across the sleep.
            let wait = {
                let mut bucket = self
                    .buckets
                    .get_mut(&class)
                    .expect("every rate class is seeded at construction");
                bucket.try_take(Instant::now())
            };
            match wait {
                None => return,
                Some(duration) => sleep(duration).await,
            }
        }
    }
}
