use std::collections::HashMap;

use async_trait::async_trait;
use civicvault_application::{RateLimitDecision, RateLimitRule, TenantRateLimiter};
use civicvault_core::AppResult;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Process-local token bucket limiter.
///
/// Buckets are keyed by the caller-supplied string and start full.
#[derive(Debug, Default)]
pub struct InMemoryTenantRateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl InMemoryTenantRateLimiter {
    /// Creates a limiter without buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantRateLimiter for InMemoryTenantRateLimiter {
    async fn try_acquire(&self, key: &str, rule: &RateLimitRule) -> AppResult<RateLimitDecision> {
        let now = Instant::now();
        let capacity = f64::from(rule.burst);
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(key.to_owned()).or_insert(Bucket {
            tokens: capacity,
            refilled_at: now,
        });

        let elapsed = now.saturating_duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * f64::from(rule.requests_per_second)).min(capacity);
        bucket.refilled_at = now;

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        }

        Ok(RateLimitDecision {
            allowed,
            remaining: bucket.tokens.floor() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use civicvault_application::{RateLimitRule, TenantRateLimiter};

    use super::InMemoryTenantRateLimiter;

    #[tokio::test(start_paused = true)]
    async fn bucket_drains_then_refills_at_rate() {
        let limiter = InMemoryTenantRateLimiter::new();
        let rule = RateLimitRule::new("tenant", 2, 2);

        for _ in 0..2 {
            let decision = limiter.try_acquire("tenant:berlin_de", &rule).await;
            assert_eq!(decision.map(|decision| decision.allowed).ok(), Some(true));
        }
        let exhausted = limiter.try_acquire("tenant:berlin_de", &rule).await;
        assert_eq!(exhausted.map(|decision| decision.allowed).ok(), Some(false));

        let other = limiter.try_acquire("tenant:malmo_se", &rule).await;
        assert_eq!(other.map(|decision| decision.allowed).ok(), Some(true));

        tokio::time::advance(Duration::from_millis(500)).await;
        let refilled = limiter.try_acquire("tenant:berlin_de", &rule).await;
        assert_eq!(refilled.map(|decision| decision.allowed).ok(), Some(true));
    }
}
