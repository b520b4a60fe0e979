use std::sync::Arc;

use civicvault_core::{AppError, AppResult, TenantId};
use tracing::warn;

use super::config::RateLimitRule;
use super::ports::TenantRateLimiter;
use crate::isolation_settings::{IsolationSettings, bounded};
use crate::security_metrics::SecurityMetrics;

/// Application service for per-tenant rate limiting.
#[derive(Clone)]
pub struct RateLimitService {
    limiter: Arc<dyn TenantRateLimiter>,
    rule: RateLimitRule,
    metrics: Arc<dyn SecurityMetrics>,
    settings: IsolationSettings,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(
        limiter: Arc<dyn TenantRateLimiter>,
        rule: RateLimitRule,
        metrics: Arc<dyn SecurityMetrics>,
        settings: IsolationSettings,
    ) -> Self {
        Self {
            limiter,
            rule,
            metrics,
            settings,
        }
    }

    /// Takes one token from the tenant's bucket.
    ///
    /// Returns `Err(AppError::RateLimited)` when the bucket is empty and
    /// `Err(AppError::Timeout)` when the limiter does not answer within the
    /// read budget.
    pub async fn check_tenant(&self, tenant_id: &TenantId) -> AppResult<()> {
        let key = format!("{}:{tenant_id}", self.rule.category);
        let decision = bounded(
            self.settings.read_timeout,
            "rate limit check",
            self.limiter.try_acquire(&key, &self.rule),
        )
        .await?;

        if !decision.allowed {
            self.metrics.record_rate_limited(tenant_id);
            warn!(tenant_id = %tenant_id, "tenant rate limit exceeded");
            return Err(AppError::RateLimited(
                "too many requests, please try again later".to_owned(),
            ));
        }

        Ok(())
    }
}
