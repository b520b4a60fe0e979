//! Access audit log service.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use civicvault_core::{AppResult, TenantId};
use civicvault_domain::{AccessAuditEntry, Tenant, ViolationType};
use tracing::{error, info};

use crate::isolation_ports::{AccessAuditQuery, AccessAuditRepository};
use crate::isolation_settings::{IsolationSettings, bounded};
use crate::security_metrics::SecurityMetrics;

/// Upper bound for a single audit listing.
pub const MAX_AUDIT_PAGE: usize = 1_000;

/// Application service that records and queries access decisions.
#[derive(Clone)]
pub struct AuditService {
    repository: Arc<dyn AccessAuditRepository>,
    metrics: Arc<dyn SecurityMetrics>,
    settings: IsolationSettings,
    retention_floor_days: u32,
}

impl AuditService {
    /// Creates an audit service. `retention_floor_days` is the deployment-wide minimum.
    #[must_use]
    pub fn new(
        repository: Arc<dyn AccessAuditRepository>,
        metrics: Arc<dyn SecurityMetrics>,
        settings: IsolationSettings,
        retention_floor_days: u32,
    ) -> Self {
        Self {
            repository,
            metrics,
            settings,
            retention_floor_days,
        }
    }

    /// Persists one access decision.
    ///
    /// Failures never reach the caller. They are logged and counted so the
    /// primary response path is not blocked by the audit store.
    pub async fn log_access(&self, entry: AccessAuditEntry) {
        let audit_id = entry.audit_id;
        let action = entry.action;
        let result = bounded(
            self.settings.read_timeout,
            "audit append",
            self.repository.append(entry),
        )
        .await;

        if let Err(error) = result {
            self.metrics.record_audit_write_failure();
            error!(
                audit_id = %audit_id,
                action = action.as_str(),
                error = %error,
                "failed to persist access audit entry"
            );
        }
    }

    /// Lists entries that addressed `tenant_id`, newest first.
    pub async fn entries_for_tenant(
        &self,
        tenant_id: &TenantId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<AccessAuditEntry>> {
        bounded(
            self.settings.bulk_timeout,
            "audit tenant listing",
            self.repository.list_for_tenant(
                tenant_id,
                AccessAuditQuery {
                    since,
                    limit: limit.min(MAX_AUDIT_PAGE),
                },
            ),
        )
        .await
    }

    /// Lists recorded isolation violations, newest first.
    pub async fn violations(
        &self,
        violation_type: Option<ViolationType>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<AccessAuditEntry>> {
        bounded(
            self.settings.bulk_timeout,
            "audit violation listing",
            self.repository.list_violations(
                violation_type,
                AccessAuditQuery {
                    since,
                    limit: limit.min(MAX_AUDIT_PAGE),
                },
            ),
        )
        .await
    }

    /// Deletes entries older than each tenant's retention period.
    ///
    /// The effective period is the larger of the deployment floor and the
    /// tenant's own `retention_days`. `tenants` must be the whole registry:
    /// entries addressing any other tenant id expire after the floor.
    pub async fn purge_expired(&self, tenants: &[Tenant], now: DateTime<Utc>) -> AppResult<u64> {
        let mut purged = 0;
        for tenant in tenants {
            let days = self.retention_floor_days.max(tenant.retention_days());
            let cutoff = now - Duration::days(i64::from(days));
            let removed = bounded(
                self.settings.bulk_timeout,
                "audit purge",
                self.repository.purge_before(tenant.tenant_id(), cutoff),
            )
            .await?;

            if removed > 0 {
                info!(
                    tenant_id = %tenant.tenant_id(),
                    removed,
                    retention_days = days,
                    "purged expired audit entries"
                );
            }
            purged += removed;
        }

        let known: Vec<TenantId> = tenants
            .iter()
            .map(|tenant| tenant.tenant_id().clone())
            .collect();
        let cutoff = now - Duration::days(i64::from(self.retention_floor_days));
        let orphaned = bounded(
            self.settings.bulk_timeout,
            "unowned audit purge",
            self.repository.purge_unowned_before(&known, cutoff),
        )
        .await?;
        if orphaned > 0 {
            info!(
                removed = orphaned,
                retention_days = self.retention_floor_days,
                "purged expired audit entries of unregistered tenants"
            );
        }

        Ok(purged + orphaned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use chrono::{Duration, Utc};
    use civicvault_domain::{AccessAction, AccessAuditEntry, Tenant, ViolationType};

    use super::AuditService;
    use crate::IsolationSettings;
    use crate::test_support::{CountingMetrics, FakeAuditRepository, new_tenant, tenant_id};

    fn entry(tenant: &str) -> AccessAuditEntry {
        AccessAuditEntry::granted(
            tenant_id(tenant),
            tenant,
            "user-1",
            AccessAction::Read,
            "content_item",
            "content-1",
        )
    }

    #[tokio::test]
    async fn audit_write_failures_are_swallowed_and_counted() {
        let repository = Arc::new(FakeAuditRepository::default());
        repository.fail_appends.store(true, Ordering::SeqCst);
        let metrics = Arc::new(CountingMetrics::default());
        let service = AuditService::new(
            repository.clone(),
            metrics.clone(),
            IsolationSettings::default(),
            2555,
        );

        service.log_access(entry("malmo_stad")).await;

        assert_eq!(metrics.audit_failures.load(Ordering::SeqCst), 1);
        assert!(repository.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn violations_are_filtered_by_type() {
        let repository = Arc::new(FakeAuditRepository::default());
        let service = AuditService::new(
            repository,
            Arc::new(CountingMetrics::default()),
            IsolationSettings::default(),
            2555,
        );
        service.log_access(entry("malmo_stad")).await;
        service
            .log_access(entry("malmo_stad").denied(Some(ViolationType::LeakAttempt)))
            .await;
        service
            .log_access(entry("berlin_de").denied(Some(ViolationType::CrossTenantAccess)))
            .await;

        let since = Utc::now() - Duration::hours(1);
        let all = service
            .violations(None, since, 10)
            .await
            .unwrap_or_else(|_| unreachable!());
        let leaks = service
            .violations(Some(ViolationType::LeakAttempt), since, 10)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(all.len(), 2);
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].requested_tenant_id, "malmo_stad");
    }

    #[tokio::test]
    async fn purge_uses_longest_retention() {
        let repository = Arc::new(FakeAuditRepository::default());
        let service = AuditService::new(
            repository.clone(),
            Arc::new(CountingMetrics::default()),
            IsolationSettings::default(),
            30,
        );

        let now = Utc::now();
        let mut old = entry("malmo_stad");
        old.timestamp = now - Duration::days(40);
        let mut recent = entry("malmo_stad");
        recent.timestamp = now - Duration::days(10);
        let mut long_kept = entry("berlin_de");
        long_kept.timestamp = now - Duration::days(40);
        for item in [old, recent, long_kept] {
            service.log_access(item).await;
        }

        let mut malmo = new_tenant("malmo_stad");
        malmo.retention_days = Some(7);
        let mut berlin = new_tenant("berlin_de");
        berlin.retention_days = Some(365);
        let tenants = [malmo, berlin]
            .into_iter()
            .map(|input| Tenant::provision(input).unwrap_or_else(|_| unreachable!()))
            .collect::<Vec<_>>();

        let purged = service.purge_expired(&tenants, now).await;
        assert_eq!(purged, Ok(1));
        assert_eq!(repository.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn purge_reaches_entries_of_unregistered_tenants() {
        let repository = Arc::new(FakeAuditRepository::default());
        let service = AuditService::new(
            repository.clone(),
            Arc::new(CountingMetrics::default()),
            IsolationSettings::default(),
            30,
        );

        let now = Utc::now();
        let addressed = |requested: &str, age: i64| {
            let mut item = AccessAuditEntry::granted(
                tenant_id("malmo_stad"),
                requested,
                "user-1",
                AccessAction::Read,
                "content_item",
                "content-1",
            );
            item.timestamp = now - Duration::days(age);
            item
        };
        for (requested, age) in [
            ("malmo_stad", 40),
            ("Berlin DE", 40),
            ("oslo_kommune", 40),
            ("oslo_kommune", 2),
        ] {
            service.log_access(addressed(requested, age)).await;
        }

        let mut malmo = new_tenant("malmo_stad");
        malmo.retention_days = Some(365);
        let tenants = [Tenant::provision(malmo).unwrap_or_else(|_| unreachable!())];

        assert_eq!(service.purge_expired(&tenants, now).await, Ok(2));
        let remaining = repository.snapshot().await;
        assert_eq!(remaining.len(), 2);
        assert!(
            remaining
                .iter()
                .all(|item| item.requested_tenant_id != "Berlin DE")
        );
    }
}
