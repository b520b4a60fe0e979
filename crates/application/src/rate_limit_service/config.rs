/// Configuration for a token-bucket rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Bucket category, used as the key prefix (e.g. "tenant").
    pub category: String,
    /// Tokens refilled per second.
    pub requests_per_second: u32,
    /// Bucket capacity.
    pub burst: u32,
}

impl RateLimitRule {
    /// Creates a new rate limit rule.
    #[must_use]
    pub fn new(category: impl Into<String>, requests_per_second: u32, burst: u32) -> Self {
        Self {
            category: category.into(),
            requests_per_second,
            burst: burst.max(1),
        }
    }

    /// Per-tenant rule with a burst of twice the sustained rate.
    #[must_use]
    pub fn per_tenant(requests_per_second: u32) -> Self {
        Self::new(
            "tenant",
            requests_per_second,
            requests_per_second.saturating_mul(2),
        )
    }
}
