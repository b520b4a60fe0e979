//! Periodic upkeep: audit retention purge and compliance action retries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use civicvault_application::{
    AccessAuditRepository, AuditService, ComplianceActionRepository, ComplianceRetryReport,
    ComplianceService, IsolationValidator, RegistryCacheSettings, SecurityMetrics,
    TenantCacheService, TenantCacheStore, TenantDataAccess, TenantRecordRepository,
    TenantRegistryRepository, TenantRegistryService,
};
use civicvault_core::AppResult;
use civicvault_domain::TenantListFilter;
use tracing::{info, warn};

use crate::worker_config::WorkerConfig;

pub struct MaintenancePorts {
    pub registry: Arc<dyn TenantRegistryRepository>,
    pub records: Arc<dyn TenantRecordRepository>,
    pub audit: Arc<dyn AccessAuditRepository>,
    pub actions: Arc<dyn ComplianceActionRepository>,
    pub cache_store: Arc<dyn TenantCacheStore>,
}

/// Outcome of one maintenance cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub tenants: usize,
    pub purged_audit_entries: u64,
    pub compliance: ComplianceRetryReport,
}

#[derive(Clone)]
pub struct MaintenanceJobs {
    registry: TenantRegistryService,
    audit: AuditService,
    compliance: ComplianceService,
    max_attempts: u32,
}

impl MaintenanceJobs {
    pub fn new(
        ports: MaintenancePorts,
        config: &WorkerConfig,
        metrics: Arc<dyn SecurityMetrics>,
    ) -> AppResult<Self> {
        let assigner = config.partition_assigner()?;
        let registry = TenantRegistryService::new(
            ports.registry,
            assigner.clone(),
            RegistryCacheSettings::default(),
            config.isolation,
        );
        let audit = AuditService::new(
            ports.audit,
            metrics.clone(),
            config.isolation,
            config.audit_retention_days,
        );
        let validator = IsolationValidator::new(assigner.clone(), audit.clone(), metrics);
        let dal = TenantDataAccess::new(ports.records, assigner.clone(), config.isolation);
        let cache = TenantCacheService::new(
            ports.cache_store,
            assigner,
            validator.clone(),
            config.isolation,
        );
        let compliance = ComplianceService::new(
            dal,
            cache,
            validator,
            ports.actions,
            config.compliance_resource_types.clone(),
            config.isolation,
        );

        Ok(Self {
            registry,
            audit,
            compliance,
            max_attempts: config.compliance_max_attempts,
        })
    }

    /// Runs both jobs. A failing job is logged and does not stop the other.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        match self.purge_audit(now).await {
            Ok((tenants, purged)) => {
                report.tenants = tenants;
                report.purged_audit_entries = purged;
            }
            Err(error) => warn!(error = %error, "audit retention purge failed"),
        }

        match self
            .compliance
            .retry_failed_actions(self.max_attempts)
            .await
        {
            Ok(retry) => report.compliance = retry,
            Err(error) => warn!(error = %error, "compliance retry sweep failed"),
        }

        info!(
            tenants = report.tenants,
            purged_audit_entries = report.purged_audit_entries,
            retried = report.compliance.retried,
            recovered = report.compliance.recovered,
            escalated = report.compliance.escalated,
            "maintenance cycle finished"
        );
        report
    }

    async fn purge_audit(&self, now: DateTime<Utc>) -> AppResult<(usize, u64)> {
        let tenants = self.registry.list(&TenantListFilter::default()).await?;
        let purged = self.audit.purge_expired(&tenants, now).await?;
        Ok((tenants.len(), purged))
    }
}
