use async_trait::async_trait;
use chrono::{DateTime, Utc};
use civicvault_core::{AppResult, TenantId};
use civicvault_domain::{AccessAuditEntry, ComplianceActionRecord, ViolationType};
use uuid::Uuid;

/// Query inputs for audit reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessAuditQuery {
    /// Only entries at or after this time.
    pub since: DateTime<Utc>,
    /// Maximum rows returned.
    pub limit: usize,
}

/// Port for the append-only access audit log.
///
/// Backed by indexes on `(requested_tenant_id, timestamp)` and
/// `(violation_type, timestamp)`.
#[async_trait]
pub trait AccessAuditRepository: Send + Sync {
    /// Appends one entry.
    async fn append(&self, entry: AccessAuditEntry) -> AppResult<()>;

    /// Lists entries addressing `tenant_id`, newest first.
    async fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
        query: AccessAuditQuery,
    ) -> AppResult<Vec<AccessAuditEntry>>;

    /// Lists violation entries, optionally of one type, newest first.
    async fn list_violations(
        &self,
        violation_type: Option<ViolationType>,
        query: AccessAuditQuery,
    ) -> AppResult<Vec<AccessAuditEntry>>;

    /// Deletes entries of `tenant_id` older than `cutoff`.
    async fn purge_before(&self, tenant_id: &TenantId, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// Deletes entries older than `cutoff` that address none of `known_tenants`.
    ///
    /// Reaches entries of deregistered tenants and of requests that named an
    /// unknown or malformed tenant.
    async fn purge_unowned_before(
        &self,
        known_tenants: &[TenantId],
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64>;
}

/// Port for compliance action lifecycle records.
#[async_trait]
pub trait ComplianceActionRepository: Send + Sync {
    /// Inserts or updates an action by id.
    async fn save(&self, action: &ComplianceActionRecord) -> AppResult<()>;

    /// Finds an action by id.
    async fn find(&self, action_id: Uuid) -> AppResult<Option<ComplianceActionRecord>>;

    /// Lists failed actions that were not escalated yet, oldest first.
    async fn list_pending_failures(&self, limit: usize) -> AppResult<Vec<ComplianceActionRecord>>;

    /// Lists actions of one tenant, newest first.
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> AppResult<Vec<ComplianceActionRecord>>;
}
