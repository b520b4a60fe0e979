use async_trait::async_trait;

use civicvault_core::AppResult;

use super::config::RateLimitRule;

/// Token bucket port keyed by an opaque string.
#[async_trait]
pub trait TenantRateLimiter: Send + Sync {
    /// Takes one token from the bucket at `key`, refilling it first.
    ///
    /// Implementations must apply refill and take atomically.
    async fn try_acquire(&self, key: &str, rule: &RateLimitRule) -> AppResult<RateLimitDecision>;
}

/// Outcome of a single acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether a token was taken.
    pub allowed: bool,
    /// Whole tokens left after this call.
    pub remaining: u32,
}
