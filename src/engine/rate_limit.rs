// AI rate limiter
//
// A sliding-window request check and a fixed-window token check. The check
// and the increment it gates run as one atomic step under a single lock -
// two separate calls here would let concurrent callers all pass the check
// before any of them recorded, which defeats the limiter entirely.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::models::RateLimitConfig;
use crate::{EngineError, Result};

#[async_trait]
pub trait RateLimitStorage: Send + Sync {
    async fn request_count_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32>;
    async fn token_count_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32>;
    async fn record_request(&self, user_id: &str, tokens_used: u32) -> Result<()>;
}

pub struct AiRateLimiter {
    storage: Arc<dyn RateLimitStorage>,
    config: RateLimitConfig,
    lock: Mutex<()>,
}

impl AiRateLimiter {
    pub fn new(storage: Arc<dyn RateLimitStorage>, config: RateLimitConfig) -> Self {
        AiRateLimiter { storage, config, lock: Mutex::new(()) }
    }

    /// Atomically checks whether `user_id` may make one more request of
    /// `tokens_used` tokens and, if so, records it. The check and the
    /// record happen while holding the same lock, so no second caller can
    /// observe the pre-record counts. On storage failure, the configured
    /// `fail_close` decides whether the request is denied (safe default) or
    /// allowed through without being recorded.
    pub async fn enforce_and_record(&self, user_id: &str, tokens_used: u32) -> Result<()> {
        let _guard = self.lock.lock().await;

        let now = Utc::now();
        let window_start = now.with_second(0).unwrap().with_nanosecond(0).unwrap();
        let burst_requests = (self.config.default_requests_per_window as f32 * self.config.burst_multiplier) as u32;
        let burst_tokens = (self.config.default_tokens_per_window as f32 * self.config.burst_multiplier) as u32;

        let requests = match self.storage.request_count_since(user_id, window_start).await {
            Ok(v) => v,
            Err(_) if self.config.fail_close => {
                return Err(EngineError::RateLimited(format!("user {} rate limit unavailable", user_id)));
            }
            Err(_) => return Ok(()),
        };
        if requests >= burst_requests {
            return Err(EngineError::RateLimited(format!("user {} exceeded the AI request budget", user_id)));
        }

        let tokens = match self.storage.token_count_since(user_id, window_start).await {
            Ok(v) => v,
            Err(_) if self.config.fail_close => {
                return Err(EngineError::RateLimited(format!("user {} rate limit unavailable", user_id)));
            }
            Err(_) => return Ok(()),
        };
        if tokens >= burst_tokens {
            return Err(EngineError::RateLimited(format!("user {} exceeded the AI token budget", user_id)));
        }

        self.storage.record_request(user_id, tokens_used).await
    }
}

#[derive(Default)]
pub struct InMemoryRateLimitStorage {
    records: RwLock<HashMap<String, Vec<(DateTime<Utc>, u32)>>>,
}

#[async_trait]
impl RateLimitStorage for InMemoryRateLimitStorage {
    async fn request_count_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32> {
        let records = self.records.read().await;
        Ok(records.get(user_id).map(|r| r.iter().filter(|(t, _)| *t >= since).count() as u32).unwrap_or(0))
    }

    async fn token_count_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32> {
        let records = self.records.read().await;
        Ok(records
            .get(user_id)
            .map(|r| r.iter().filter(|(t, _)| *t >= since).map(|(_, tokens)| tokens).sum())
            .unwrap_or(0))
    }

    async fn record_request(&self, user_id: &str, tokens_used: u32) -> Result<()> {
        let mut records = self.records.write().await;
        records.entry(user_id.to_string()).or_default().push((Utc::now(), tokens_used));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_requests_under_the_burst_ceiling() {
        let storage = Arc::new(InMemoryRateLimitStorage::default());
        let limiter = AiRateLimiter::new(storage, RateLimitConfig { default_requests_per_window: 2, burst_multiplier: 1.0, ..RateLimitConfig::default() });
        assert!(limiter.enforce_and_record("u1", 10).await.is_ok());
        assert!(limiter.enforce_and_record("u1", 10).await.is_ok());
        assert!(matches!(limiter.enforce_and_record("u1", 10).await, Err(EngineError::RateLimited(_))));
    }

    #[tokio::test]
    async fn enforce_raises_rate_limited_error_when_exhausted() {
        let storage = Arc::new(InMemoryRateLimitStorage::default());
        let limiter = AiRateLimiter::new(storage, RateLimitConfig { default_requests_per_window: 1, burst_multiplier: 1.0, ..RateLimitConfig::default() });
        limiter.enforce_and_record("u1", 1).await.unwrap();
        let result = limiter.enforce_and_record("u1", 1).await;
        assert!(matches!(result, Err(EngineError::RateLimited(_))));
    }

    #[tokio::test]
    async fn concurrent_callers_cannot_both_pass_a_single_remaining_slot() {
        let storage = Arc::new(InMemoryRateLimitStorage::default());
        let limiter = Arc::new(AiRateLimiter::new(
            storage,
            RateLimitConfig { default_requests_per_window: 1, burst_multiplier: 1.0, ..RateLimitConfig::default() },
        ));

        let a = limiter.clone();
        let b = limiter.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a.enforce_and_record("u1", 1).await }),
            tokio::spawn(async move { b.enforce_and_record("u1", 1).await }),
        );

        let outcomes = [r1.unwrap(), r2.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(outcomes.iter().filter(|r| r.is_err()).count(), 1);
    }
}
