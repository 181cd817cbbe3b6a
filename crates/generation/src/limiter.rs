//! Sliding-window quota limiter.
//!
//! A cache-aside counter per user: the first check inside a 24-hour
//! window seeds the in-memory counter from the analytical store, and
//! every later check and increment works purely in memory. Increments
//! go through the map's exclusive entry guard, so no update is lost
//! under concurrent submissions by the same user.

use std::sync::Arc;

use atelier_core::types::{DbId, Timestamp};
use chrono::{Duration, Utc};
use dashmap::DashMap;

use crate::stores::UsageSource;

/// Length of the rolling window in hours.
const WINDOW_HOURS: i64 = 24;

/// Per-tier limiter configuration.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Images a user may generate inside one window.
    pub user_limit: i64,
}

impl LimiterConfig {
    /// Load from `GENERATION_USER_LIMIT` (default 1000).
    pub fn from_env() -> Self {
        Self {
            user_limit: std::env::var("GENERATION_USER_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        }
    }
}

#[derive(Debug, Clone)]
struct WindowCounter {
    window_start: Timestamp,
    count: i64,
    limit_hit_at: Option<Timestamp>,
}

/// Per-user sliding-window request counter.
pub struct QuotaLimiter {
    counters: DashMap<DbId, WindowCounter>,
    source: Arc<dyn UsageSource>,
    config: LimiterConfig,
}

impl QuotaLimiter {
    pub fn new(source: Arc<dyn UsageSource>, config: LimiterConfig) -> Self {
        Self {
            counters: DashMap::new(),
            source,
            config,
        }
    }

    /// Whether the user has exhausted their window quota.
    pub async fn has_exceeded_limit(&self, user_id: DbId) -> anyhow::Result<bool> {
        self.ensure_seeded(user_id).await?;
        Ok(self
            .counters
            .get(&user_id)
            .map(|c| c.count >= self.config.user_limit)
            .unwrap_or(false))
    }

    /// When the user first hit the limit in the current window, if known.
    pub fn limit_hit_time(&self, user_id: DbId) -> Option<Timestamp> {
        self.counters.get(&user_id).and_then(|c| c.limit_hit_at)
    }

    /// Earliest time the current window rolls over for the user.
    pub fn retry_estimate(&self, user_id: DbId) -> Option<Timestamp> {
        self.counters
            .get(&user_id)
            .map(|c| c.window_start + Duration::hours(WINDOW_HOURS))
    }

    /// Add `weight` submitted images to the user's counter.
    ///
    /// The exclusive entry guard makes the read-modify-write atomic.
    pub fn increment(&self, user_id: DbId, weight: i64) {
        let now = Utc::now();
        let limit = self.config.user_limit;
        self.counters
            .entry(user_id)
            .and_modify(|counter| {
                counter.count += weight;
                if counter.count >= limit && counter.limit_hit_at.is_none() {
                    counter.limit_hit_at = Some(now);
                }
            })
            .or_insert_with(|| WindowCounter {
                window_start: now,
                count: weight,
                limit_hit_at: None,
            });
    }

    /// Seed (or re-seed) the counter from the analytical store when the
    /// user has no live window. Racing seeders are harmless: the first
    /// insert wins and both observed the same historical count.
    async fn ensure_seeded(&self, user_id: DbId) -> anyhow::Result<()> {
        let now = Utc::now();
        let expired = match self.counters.get(&user_id) {
            Some(counter) => now - counter.window_start > Duration::hours(WINDOW_HOURS),
            None => true,
        };
        if !expired {
            return Ok(());
        }

        let historical = self.source.count_last_24h(user_id).await?;
        self.counters.insert(
            user_id,
            WindowCounter {
                window_start: now,
                count: historical,
                limit_hit_at: None,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedUsage {
        count: i64,
        queries: AtomicUsize,
    }

    impl FixedUsage {
        fn new(count: i64) -> Self {
            Self {
                count,
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UsageSource for FixedUsage {
        async fn count_last_24h(&self, _user_id: DbId) -> anyhow::Result<i64> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.count)
        }
    }

    fn limiter_with(seed: i64, limit: i64) -> (QuotaLimiter, Arc<FixedUsage>) {
        let source = Arc::new(FixedUsage::new(seed));
        let limiter = QuotaLimiter::new(source.clone(), LimiterConfig { user_limit: limit });
        (limiter, source)
    }

    #[tokio::test]
    async fn cold_start_seeds_from_analytical_store_once() {
        let (limiter, source) = limiter_with(5, 10);

        assert!(!limiter.has_exceeded_limit(1).await.unwrap());
        assert!(!limiter.has_exceeded_limit(1).await.unwrap());
        // Second check served from memory.
        assert_eq!(source.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn seeded_at_limit_is_exceeded() {
        let (limiter, _) = limiter_with(10, 10);
        assert!(limiter.has_exceeded_limit(1).await.unwrap());
    }

    #[tokio::test]
    async fn increments_push_user_over_the_limit() {
        let (limiter, _) = limiter_with(8, 10);

        assert!(!limiter.has_exceeded_limit(1).await.unwrap());
        limiter.increment(1, 2);
        assert!(limiter.has_exceeded_limit(1).await.unwrap());
        assert!(limiter.limit_hit_time(1).is_some());
        assert!(limiter.retry_estimate(1).is_some());
    }

    #[tokio::test]
    async fn users_are_counted_independently() {
        let (limiter, _) = limiter_with(0, 10);

        limiter.increment(1, 10);
        assert!(limiter.has_exceeded_limit(1).await.unwrap());
        assert!(!limiter.has_exceeded_limit(2).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_increments_lose_no_updates() {
        let (limiter, _) = limiter_with(0, 1000);
        let limiter = Arc::new(limiter);

        // Seed the counter so every task takes the and_modify path.
        assert!(!limiter.has_exceeded_limit(1).await.unwrap());

        let mut handles = Vec::new();
        for _ in 0..100 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.increment(1, 1);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let count = limiter.counters.get(&1).unwrap().count;
        assert_eq!(count, 100);
    }
}
