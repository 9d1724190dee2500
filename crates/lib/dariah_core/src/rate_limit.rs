//! Refilling token bucket, keyed by client identifier.
//!
//! Each key owns a bucket of at most `capacity` tokens that refills linearly
//! at `capacity / refill_interval` tokens per second. Fractional tokens are
//! kept between calls. Buckets are created full on first use and live in a
//! sharded [`DashMap`], so only calls for the same key contend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Per-key token bucket rate limiter.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_interval: Duration,
    buckets: DashMap<String, Bucket>,
}

impl TokenBucket {
    /// Create a limiter that refills `capacity` tokens every `refill_interval`.
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_interval,
            buckets: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Try to take `cost` tokens from `key`'s bucket.
    pub fn consume(&self, key: &str, cost: u32) -> bool {
        self.consume_at(key, cost, Instant::now())
    }

    /// [`consume`](Self::consume) with an explicit clock.
    ///
    /// A `now` earlier than the last refill counts as no elapsed time and does
    /// not move `refilled_at` backwards.
    pub fn consume_at(&self, key: &str, cost: u32, now: Instant) -> bool {
        let capacity = f64::from(self.capacity);
        let cost = f64::from(cost);

        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: capacity,
            refilled_at: now,
        });
        let bucket = entry.value_mut();

        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        bucket.tokens = (bucket.tokens + self.refill_amount(elapsed)).min(capacity);
        bucket.refilled_at = bucket.refilled_at.max(now);

        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }

    fn refill_amount(&self, elapsed: Duration) -> f64 {
        let capacity = f64::from(self.capacity);
        if elapsed >= self.refill_interval {
            return capacity;
        }
        (elapsed.as_secs_f64() / self.refill_interval.as_secs_f64()) * capacity
    }

    /// Drop buckets untouched for at least one full refill interval.
    ///
    /// Such a bucket is already back at capacity, which is exactly what a
    /// newly created one would hold, so evicting it changes no decision.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    /// [`evict_idle`](Self::evict_idle) with an explicit clock.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.refilled_at) < self.refill_interval);
        before.saturating_sub(self.buckets.len())
    }

    /// Spawn a periodic eviction task that runs until `cancel` fires.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let evicted = limiter.evict_idle();
                        if evicted > 0 {
                            debug!(evicted, remaining = limiter.len(), "evicted idle rate-limit buckets");
                        }
                    }
                }
            }
        })
    }
}
