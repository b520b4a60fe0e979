//! Tenant-scoped circuit breaker for repeated storage timeouts.

use std::sync::Arc;
use std::time::Duration;

use civicvault_core::{AppError, AppResult, TenantId};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::security_metrics::SecurityMetrics;

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSettings {
    /// Consecutive timeouts that open the breaker.
    pub failure_threshold: u32,
    /// How long an open breaker rejects requests.
    pub open_duration: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BreakerState {
    consecutive_timeouts: u32,
    open_until: Option<Instant>,
}

/// Per-tenant breaker; one tenant tripping never affects another.
#[derive(Clone)]
pub struct TenantCircuitBreaker {
    states: Arc<DashMap<TenantId, BreakerState>>,
    settings: CircuitBreakerSettings,
    metrics: Arc<dyn SecurityMetrics>,
}

impl TenantCircuitBreaker {
    /// Creates a breaker registry.
    #[must_use]
    pub fn new(settings: CircuitBreakerSettings, metrics: Arc<dyn SecurityMetrics>) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            settings: CircuitBreakerSettings {
                failure_threshold: settings.failure_threshold.max(1),
                ..settings
            },
            metrics,
        }
    }

    /// Fails fast with `TenantUnavailable` while the tenant's breaker is open.
    pub fn check(&self, tenant_id: &TenantId) -> AppResult<()> {
        let Some(state) = self.states.get(tenant_id) else {
            return Ok(());
        };

        match state.open_until {
            Some(open_until) if Instant::now() < open_until => Err(AppError::TenantUnavailable(
                "tenant storage is temporarily unavailable, retry later".to_owned(),
            )),
            _ => Ok(()),
        }
    }

    /// Feeds one operation outcome into the tenant's breaker.
    ///
    /// Only `Timeout` counts as a failure; any success closes the breaker.
    pub fn record<T>(&self, tenant_id: &TenantId, outcome: &AppResult<T>) {
        match outcome {
            Ok(_) => {
                if let Some((_, previous)) = self.states.remove(tenant_id)
                    && previous.open_until.is_some()
                {
                    info!(tenant_id = %tenant_id, "tenant circuit breaker closed");
                }
            }
            Err(AppError::Timeout(_)) => {
                let mut opened = false;
                {
                    let mut state = self.states.entry(tenant_id.clone()).or_default();
                    state.consecutive_timeouts = state.consecutive_timeouts.saturating_add(1);
                    if state.consecutive_timeouts >= self.settings.failure_threshold {
                        state.consecutive_timeouts = 0;
                        state.open_until = Some(Instant::now() + self.settings.open_duration);
                        opened = true;
                    }
                }

                if opened {
                    self.metrics.record_circuit_opened(tenant_id);
                    warn!(
                        tenant_id = %tenant_id,
                        open_seconds = self.settings.open_duration.as_secs(),
                        "tenant circuit breaker opened"
                    );
                }
            }
            Err(_) => {}
        }
    }
}
