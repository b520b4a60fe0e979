use std::sync::atomic::{AtomicU64, Ordering};

use civicvault_application::SecurityMetrics;
use civicvault_core::TenantId;
use civicvault_domain::ViolationType;
use tracing::{info, warn};

/// Point-in-time copy of the security counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecurityMetricsSnapshot {
    /// Cross-tenant access attempts.
    pub cross_tenant_access: u64,
    /// Role checks that failed.
    pub privilege_escalation: u64,
    /// Foreign data caught on the response path.
    pub leak_attempt: u64,
    /// Audit writes that were lost.
    pub audit_write_failures: u64,
    /// Requests rejected by tenant rate limits.
    pub rate_limited: u64,
    /// Tenant circuit breakers opened.
    pub circuits_opened: u64,
}

/// Counts security events in memory and emits one `tracing` event per call.
///
/// Events use the `civicvault::security_metrics` target so a log pipeline can
/// route them to the monitoring backend.
#[derive(Debug, Default)]
pub struct TracingSecurityMetrics {
    cross_tenant_access: AtomicU64,
    privilege_escalation: AtomicU64,
    leak_attempt: AtomicU64,
    audit_write_failures: AtomicU64,
    rate_limited: AtomicU64,
    circuits_opened: AtomicU64,
}

impl TracingSecurityMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> SecurityMetricsSnapshot {
        SecurityMetricsSnapshot {
            cross_tenant_access: self.cross_tenant_access.load(Ordering::Relaxed),
            privilege_escalation: self.privilege_escalation.load(Ordering::Relaxed),
            leak_attempt: self.leak_attempt.load(Ordering::Relaxed),
            audit_write_failures: self.audit_write_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            circuits_opened: self.circuits_opened.load(Ordering::Relaxed),
        }
    }
}

impl SecurityMetrics for TracingSecurityMetrics {
    fn record_isolation_violation(&self, violation_type: ViolationType, check: &str) {
        let counter = match violation_type {
            ViolationType::CrossTenantAccess => &self.cross_tenant_access,
            ViolationType::PrivilegeEscalation => &self.privilege_escalation,
            ViolationType::LeakAttempt => &self.leak_attempt,
        };
        let total = counter.fetch_add(1, Ordering::Relaxed) + 1;

        warn!(
            target: "civicvault::security_metrics",
            metric = "isolation_violations_total",
            violation_type = violation_type.as_str(),
            check,
            total,
            "security metric emitted"
        );
    }

    fn record_audit_write_failure(&self) {
        let total = self.audit_write_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            target: "civicvault::security_metrics",
            metric = "audit_write_failures_total",
            total,
            "security metric emitted"
        );
    }

    fn record_rate_limited(&self, tenant_id: &TenantId) {
        let total = self.rate_limited.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            target: "civicvault::security_metrics",
            metric = "rate_limited_total",
            tenant_id = tenant_id.as_str(),
            total,
            "security metric emitted"
        );
    }

    fn record_circuit_opened(&self, tenant_id: &TenantId) {
        let total = self.circuits_opened.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            target: "civicvault::security_metrics",
            metric = "circuit_opened_total",
            tenant_id = tenant_id.as_str(),
            total,
            "security metric emitted"
        );
    }
}
