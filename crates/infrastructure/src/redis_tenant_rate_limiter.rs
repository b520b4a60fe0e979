//! Redis-backed token bucket rate limiter.

use async_trait::async_trait;
use civicvault_application::{RateLimitDecision, RateLimitRule, TenantRateLimiter};
use civicvault_core::{AppError, AppResult};
use redis::Script;

// Refill and take run in one script so concurrent nodes share a bucket.
// Server time is used so node clock skew cannot mint tokens.
const TAKE_TOKEN_SCRIPT: &str = r#"
local key = KEYS[1]
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local time = redis.call('TIME')
local now = tonumber(time[1]) * 1000 + math.floor(tonumber(time[2]) / 1000)

local state = redis.call('HMGET', key, 'tokens', 'refilled_at')
local tokens = tonumber(state[1])
local refilled_at = tonumber(state[2])
if tokens == nil or refilled_at == nil then
  tokens = capacity
  refilled_at = now
end

local elapsed = math.max(0, now - refilled_at)
tokens = math.min(capacity, tokens + elapsed * rate / 1000)

local allowed = 0
if tokens >= 1 then
  tokens = tokens - 1
  allowed = 1
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'refilled_at', now)
redis.call('PEXPIRE', key, math.ceil(capacity / math.max(rate, 1) * 1000) + 1000)

return {allowed, math.floor(tokens)}
"#;

/// Redis implementation of the tenant rate limiter port.
#[derive(Clone)]
pub struct RedisTenantRateLimiter {
    client: redis::Client,
    key_prefix: String,
}

impl RedisTenantRateLimiter {
    /// Creates a limiter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }
}

#[async_trait]
impl TenantRateLimiter for RedisTenantRateLimiter {
    async fn try_acquire(&self, key: &str, rule: &RateLimitRule) -> AppResult<RateLimitDecision> {
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let script = Script::new(TAKE_TOKEN_SCRIPT);
        let (allowed, remaining): (i64, i64) = script
            .key(self.key_for(key))
            .arg(rule.requests_per_second)
            .arg(rule.burst)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to take redis rate limit token: {error}"))
            })?;

        Ok(RateLimitDecision {
            allowed: allowed == 1,
            remaining: u32::try_from(remaining.max(0)).unwrap_or(u32::MAX),
        })
    }
}
