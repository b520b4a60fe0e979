use civicvault_core::TenantId;
use civicvault_domain::ViolationType;

/// Port for security counters consumed by monitoring.
///
/// Emission must not block; implementations buffer or count in memory.
pub trait SecurityMetrics: Send + Sync {
    /// Counts one detected isolation violation.
    fn record_isolation_violation(&self, violation_type: ViolationType, check: &str);

    /// Counts one audit write that could not be persisted.
    fn record_audit_write_failure(&self);

    /// Counts one request rejected by a tenant's rate limit.
    fn record_rate_limited(&self, tenant_id: &TenantId);

    /// Counts one tenant circuit breaker opening.
    fn record_circuit_opened(&self, tenant_id: &TenantId);
}
