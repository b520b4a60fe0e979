use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use civicvault_application::{
    AccessAuditQuery, AccessAuditRepository, ComplianceActionRepository,
};
use civicvault_core::{AppResult, TenantId};
use civicvault_domain::{
    AccessAuditEntry, ComplianceActionRecord, ComplianceActionStatus, ViolationType,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory append-only access audit log.
#[derive(Debug, Default)]
pub struct InMemoryAccessAuditRepository {
    entries: RwLock<Vec<AccessAuditEntry>>,
}

impl InMemoryAccessAuditRepository {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(
        mut entries: Vec<AccessAuditEntry>,
        query: &AccessAuditQuery,
    ) -> Vec<AccessAuditEntry> {
        entries.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        entries.truncate(query.limit);
        entries
    }
}

#[async_trait]
impl AccessAuditRepository for InMemoryAccessAuditRepository {
    async fn append(&self, entry: AccessAuditEntry) -> AppResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
        query: AccessAuditQuery,
    ) -> AppResult<Vec<AccessAuditEntry>> {
        let matching = self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| {
                entry.requested_tenant_id == tenant_id.as_str() && entry.timestamp >= query.since
            })
            .cloned()
            .collect();

        Ok(Self::newest_first(matching, &query))
    }

    async fn list_violations(
        &self,
        violation_type: Option<ViolationType>,
        query: AccessAuditQuery,
    ) -> AppResult<Vec<AccessAuditEntry>> {
        let matching = self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| {
                entry.timestamp >= query.since
                    && match (entry.violation_type, violation_type) {
                        (None, _) => false,
                        (Some(_), None) => true,
                        (Some(stored), Some(wanted)) => stored == wanted,
                    }
            })
            .cloned()
            .collect();

        Ok(Self::newest_first(matching, &query))
    }

    async fn purge_before(&self, tenant_id: &TenantId, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.requested_tenant_id != tenant_id.as_str() || entry.timestamp >= cutoff
        });
        Ok((before - entries.len()) as u64)
    }

    async fn purge_unowned_before(
        &self,
        known_tenants: &[TenantId],
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.timestamp >= cutoff
                || known_tenants
                    .iter()
                    .any(|known| known.as_str() == entry.requested_tenant_id)
        });
        Ok((before - entries.len()) as u64)
    }
}

/// In-memory compliance action store.
#[derive(Debug, Default)]
pub struct InMemoryComplianceActionRepository {
    actions: RwLock<HashMap<Uuid, ComplianceActionRecord>>,
}

impl InMemoryComplianceActionRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComplianceActionRepository for InMemoryComplianceActionRepository {
    async fn save(&self, action: &ComplianceActionRecord) -> AppResult<()> {
        self.actions
            .write()
            .await
            .insert(action.action_id, action.clone());
        Ok(())
    }

    async fn find(&self, action_id: Uuid) -> AppResult<Option<ComplianceActionRecord>> {
        Ok(self.actions.read().await.get(&action_id).cloned())
    }

    async fn list_pending_failures(&self, limit: usize) -> AppResult<Vec<ComplianceActionRecord>> {
        let mut failures: Vec<ComplianceActionRecord> = self
            .actions
            .read()
            .await
            .values()
            .filter(|action| action.status == ComplianceActionStatus::Failed && !action.escalated)
            .cloned()
            .collect();

        failures.sort_by(|left, right| left.timestamp.cmp(&right.timestamp));
        failures.truncate(limit);
        Ok(failures)
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> AppResult<Vec<ComplianceActionRecord>> {
        let mut actions: Vec<ComplianceActionRecord> = self
            .actions
            .read()
            .await
            .values()
            .filter(|action| &action.tenant_id == tenant_id)
            .cloned()
            .collect();

        actions.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        Ok(actions)
    }
}
